//! Core abstractions for Cask: the result/error protocol shared by every store
//! operation, the store error taxonomy, and the process-wide instance registry.
//! This crate does no I/O and no cryptography.

pub mod registry;
pub mod result;
pub mod storage;

pub use registry::InstanceRegistry;
pub use result::{
    merge_and_check, new_result, propagate, render_errors, CallSite, ErrorEntry, ErrorSink,
    RenderOptions, Reporter, ResultRecord, Status, TracingSink, ERROR, OK,
};
pub use storage::{ErrorKind, StoreError};
