use thiserror::Error;

use crate::result::Status;

/// Failures a credential store can report.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Section exists and overwriting was not requested.
    #[error("section [{section}] already exists and overwrite is disabled")]
    DuplicateSection { section: String },
    /// Requested section does not exist.
    #[error("section [{section}] does not exist")]
    SectionNotFound { section: String },
    /// Field map was not an object.
    #[error("expected field map to be an object, not {found}")]
    InvalidFieldMap { found: String },
    /// Wrong key, tampering or corruption.
    #[error("decryption failed: {reason}")]
    DecryptionFailed { reason: String },
    /// Decrypted fine but the payload is not a map of field maps.
    #[error("malformed store data: {reason}")]
    MalformedData { reason: String },
    #[error("encryption failed: {reason}")]
    EncryptionFailed { reason: String },
    #[error("i/o failure: {reason}")]
    Io { reason: String },
    /// Backing location could not be resolved.
    #[error("configuration error: {reason}")]
    Configuration { reason: String },
}

/// Fieldless mirror of [`StoreError`] carrying the status code used in records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DuplicateSection,
    SectionNotFound,
    InvalidFieldMap,
    DecryptionFailed,
    MalformedData,
    EncryptionFailed,
    Io,
    Configuration,
}

impl ErrorKind {
    const ALL: [ErrorKind; 8] = [
        ErrorKind::DuplicateSection,
        ErrorKind::SectionNotFound,
        ErrorKind::InvalidFieldMap,
        ErrorKind::DecryptionFailed,
        ErrorKind::MalformedData,
        ErrorKind::EncryptionFailed,
        ErrorKind::Io,
        ErrorKind::Configuration,
    ];

    /// Status code for this kind. Codes start at 2; 1 is the generic `ERROR`.
    pub const fn code(self) -> Status {
        match self {
            ErrorKind::DuplicateSection => 2,
            ErrorKind::SectionNotFound => 3,
            ErrorKind::InvalidFieldMap => 4,
            ErrorKind::DecryptionFailed => 5,
            ErrorKind::MalformedData => 6,
            ErrorKind::EncryptionFailed => 7,
            ErrorKind::Io => 8,
            ErrorKind::Configuration => 9,
        }
    }

    pub fn from_status(status: Status) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == status)
    }
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::DuplicateSection { .. } => ErrorKind::DuplicateSection,
            StoreError::SectionNotFound { .. } => ErrorKind::SectionNotFound,
            StoreError::InvalidFieldMap { .. } => ErrorKind::InvalidFieldMap,
            StoreError::DecryptionFailed { .. } => ErrorKind::DecryptionFailed,
            StoreError::MalformedData { .. } => ErrorKind::MalformedData,
            StoreError::EncryptionFailed { .. } => ErrorKind::EncryptionFailed,
            StoreError::Io { .. } => ErrorKind::Io,
            StoreError::Configuration { .. } => ErrorKind::Configuration,
        }
    }

    pub fn code(&self) -> Status {
        self.kind().code()
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io {
            reason: err.to_string(),
        }
    }
}
