//! Uniform result/error protocol.
//!
//! Every fallible store operation hands back a [`ResultRecord`]: a status code
//! (`0` is OK) plus the ordered list of [`ErrorEntry`] diagnostics collected
//! along the call chain. Sub-operation records are folded into their parent with
//! [`merge_and_check`] or [`propagate`]. Once a record carries a non-OK status it
//! never returns to OK; later errors still accumulate.

use std::{
    fmt::{self, Write as _},
    sync::Arc,
};

use serde::Serialize;
use tracing::error;

use crate::registry::InstanceRegistry;

/// Operation status. `OK` (0) means success, anything else is an error code.
pub type Status = i32;

pub const OK: Status = 0;
/// Generic error code used when the caller does not pick a more specific one.
pub const ERROR: Status = 1;

/// Source location attached to an error entry. Diagnostics only.
///
/// `function` is filled when the caller names it: `call_site!("add")`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CallSite {
    pub file: &'static str,
    pub line: u32,
    pub module: &'static str,
    pub function: Option<&'static str>,
}

impl CallSite {
    pub const fn new(file: &'static str, line: u32, module: &'static str) -> Self {
        Self {
            file,
            line,
            module,
            function: None,
        }
    }

    pub const fn in_function(mut self, function: &'static str) -> Self {
        self.function = Some(function);
        self
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.module)?;
        if let Some(function) = self.function {
            write!(f, "::{function}")?;
        }
        Ok(())
    }
}

/// Capture the current source location as a [`CallSite`], optionally naming
/// the enclosing function.
#[macro_export]
macro_rules! call_site {
    () => {
        $crate::result::CallSite::new(file!(), line!(), module_path!())
    };
    ($function:expr) => {
        $crate::result::CallSite::new(file!(), line!(), module_path!()).in_function($function)
    };
}

/// One diagnostic in a [`ResultRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    pub message: String,
    pub call_site: CallSite,
    pub severity: u32,
}

/// Status, accumulated errors and an optional payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord<T = ()> {
    pub status: Status,
    pub errors: Vec<ErrorEntry>,
    pub contents: Option<T>,
}

impl<T> ResultRecord<T> {
    pub fn new() -> Self {
        Self {
            status: OK,
            errors: Vec::new(),
            contents: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == OK
    }

    pub fn contents(&self) -> Option<&T> {
        self.contents.as_ref()
    }

    pub fn into_contents(self) -> Option<T> {
        self.contents
    }
}

impl<T> Default for ResultRecord<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Fresh OK record with no errors.
pub fn new_result() -> ResultRecord {
    ResultRecord::new()
}

/// Fold `child` into `parent` and report whether the child succeeded.
///
/// With `copy` set, the child's status is copied unless the parent already
/// failed, its errors are appended and a present payload replaces the parent's.
/// Without `copy`, only a failing child touches the parent (see [`propagate`]).
pub fn merge_and_check<T>(child: ResultRecord<T>, parent: &mut ResultRecord<T>, copy: bool) -> bool {
    if !copy {
        return propagate(child, parent);
    }

    let ResultRecord {
        status,
        errors,
        contents,
    } = child;

    if parent.status == OK {
        parent.status = status;
    }
    parent.errors.extend(errors);
    if contents.is_some() {
        parent.contents = contents;
    }
    status == OK
}

/// Push a failing child's status and errors into `parent`. Payloads are never
/// copied, so the two records may carry different payload types.
pub fn propagate<C, P>(child: ResultRecord<C>, parent: &mut ResultRecord<P>) -> bool {
    if child.status == OK {
        return true;
    }
    if parent.status == OK {
        parent.status = child.status;
    }
    parent.errors.extend(child.errors);
    false
}

/// Logger capability used to surface rendered errors.
pub trait ErrorSink: Send + Sync {
    fn error(&self, message: &str);
}

/// Forwards to `tracing::error!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn error(&self, message: &str) {
        error!("{message}");
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Prefix each message with `[file:line:module::function]`.
    pub show_location: bool,
}

/// Render an error list for humans. Multiple entries get a numbered banner.
pub fn render_errors(errors: &[ErrorEntry], options: RenderOptions) -> String {
    let mut out = String::new();
    let count = errors.len();
    for (index, entry) in errors.iter().enumerate() {
        if count > 1 {
            let _ = writeln!(out, "Error {:4} of {:4} {}", index + 1, count, "=".repeat(60));
        }
        if options.show_location {
            let _ = write!(out, "[{}] ", entry.call_site);
        }
        let _ = writeln!(out, "{}", entry.message);
    }
    out
}

/// Per-instance carrier of the protocol: identity, escalation threshold and
/// the sink errors are printed to.
#[derive(Clone)]
pub struct Reporter {
    id: u64,
    name: String,
    raise_threshold: Option<u32>,
    sink: Arc<dyn ErrorSink>,
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("raise_threshold", &self.raise_threshold)
            .finish_non_exhaustive()
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter {
    /// Reporter with an id from the global registry and a derived name.
    pub fn new() -> Self {
        let id = InstanceRegistry::global().next_id();
        Self {
            id,
            name: format!("cask_{id:04}"),
            raise_threshold: None,
            sink: Arc::new(TracingSink),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::new()
        }
    }

    /// Use a caller-chosen id instead of the registry's.
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    /// Errors added with `severity >= threshold` panic instead of being recorded.
    pub fn with_raise_threshold(mut self, threshold: u32) -> Self {
        self.raise_threshold = Some(threshold);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn raise_threshold(&self) -> Option<u32> {
        self.raise_threshold
    }

    /// Record a severity-0 error with the generic [`ERROR`] code.
    pub fn add_error<T>(
        &self,
        record: &mut ResultRecord<T>,
        message: impl Into<String>,
        site: CallSite,
    ) -> ErrorEntry {
        self.add_error_with(record, message, site, 0, ERROR)
    }

    /// Record an error, setting `record.status` to `code` if it is still OK.
    ///
    /// # Panics
    ///
    /// Panics when `severity` reaches the configured raise threshold. That path is
    /// reserved for programmer errors and is not meant to be caught.
    pub fn add_error_with<T>(
        &self,
        record: &mut ResultRecord<T>,
        message: impl Into<String>,
        site: CallSite,
        severity: u32,
        code: Status,
    ) -> ErrorEntry {
        let entry = ErrorEntry {
            message: message.into(),
            call_site: site,
            severity,
        };

        if let Some(threshold) = self.raise_threshold {
            if severity >= threshold {
                panic!(
                    "[{}] add_error called with severity [{}] which is >= threshold [{}]\nlocation: {}\nerror: {}",
                    self.name, severity, threshold, entry.call_site, entry.message
                );
            }
        }

        if record.status == OK {
            record.status = if code == OK { ERROR } else { code };
        }
        record.errors.push(entry.clone());
        entry
    }

    /// Render the record's errors and hand them to the sink.
    pub fn print_error<T>(&self, record: &ResultRecord<T>, options: RenderOptions) {
        if record.errors.is_empty() {
            self.sink.error("No errors in the error list.");
        } else {
            self.sink.error(&render_errors(&record.errors, options));
        }
    }
}
