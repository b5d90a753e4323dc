use thiserror::Error;

/// Coarse classification of a [`VcfdbError`], used by the import pipeline to
/// decide whether a failure is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Decode,
    OrderViolation,
    Merge,
    Storage,
    LedgerState,
    NameCollision,
    Config,
    Io,
    Serialization,
}

#[derive(Error, Debug)]
pub enum VcfdbError {
    /// Malformed source file.
    #[error("Can't decode variant file: {0}")]
    Decode(String),

    /// A source stream is not sorted by (chromosome, position).
    #[error("Input is not sorted: {0}")]
    OrderViolation(String),

    /// A record's fields don't have the shape the merger expects.
    #[error("Can't merge record: {0}")]
    Merge(String),

    #[error("Document store error: {0}")]
    Storage(String),

    /// An operation was requested against a collection in an incompatible state.
    #[error("Collection state error: {0}")]
    LedgerState(String),

    /// Duplicate file identifiers or sample names.
    #[error("Name collision: {0}")]
    NameCollision(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl VcfdbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VcfdbError::Decode(_) => ErrorKind::Decode,
            VcfdbError::OrderViolation(_) => ErrorKind::OrderViolation,
            VcfdbError::Merge(_) => ErrorKind::Merge,
            VcfdbError::Storage(_) => ErrorKind::Storage,
            VcfdbError::LedgerState(_) => ErrorKind::LedgerState,
            VcfdbError::NameCollision(_) => ErrorKind::NameCollision,
            VcfdbError::Config(_) => ErrorKind::Config,
            VcfdbError::Io(_) => ErrorKind::Io,
            VcfdbError::Json(_) => ErrorKind::Serialization,
        }
    }
}

/// Result type alias used by every vcfdb library crate.
pub type Result<T> = std::result::Result<T, VcfdbError>;
