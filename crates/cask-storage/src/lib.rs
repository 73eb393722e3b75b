//! Encrypted, file-backed credential storage.
//! Sections live in memory behind one lock and are mirrored to a single
//! AES-GCM sealed file, with keys sourced from the OS keyring, the environment
//! or (in tests) memory.

pub mod cipher;
pub mod credential_store;
pub mod key_provider;
pub mod paths;

pub use credential_store::{AddOptions, CredentialStore, FieldMap, Persist, Sections};
pub use key_provider::{KeyError, KeyMaterial, KeyProvider};
