//! Error types for friend-tree production.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for friend-tree operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unrecognized channel '{0}'")]
    UnknownChannel(String),

    #[error("invalid entry range: first_entry {first} > last_entry {last}")]
    InvalidRange { first: u64, last: u64 },

    // Input errors
    #[error("{what} not found: {path}")]
    NotFound { what: &'static str, path: PathBuf },

    #[error("column '{column}': {reason}")]
    SchemaMismatch { column: String, reason: String },

    #[error("entry {index} out of range for table with {len} rows")]
    OutOfRange { index: u64, len: u64 },

    #[error("friend table {path} has {found} rows, primary table has {expected}")]
    FriendMisaligned {
        path: PathBuf,
        expected: u64,
        found: u64,
    },

    // Computation errors
    #[error("kernel failed at entry {entry}: {source}")]
    Kernel {
        entry: u64,
        #[source]
        source: KernelError,
    },

    // Output errors
    #[error("output sink error: {0}")]
    Sink(String),

    // Library errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("columnar storage error: {0}")]
    Storage(#[from] polars::error::PolarsError),

    #[error("worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    /// Process exit code for this error category.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Config(_) | Error::UnknownChannel(_) | Error::InvalidRange { .. } => 10,
            Error::NotFound { .. }
            | Error::SchemaMismatch { .. }
            | Error::OutOfRange { .. }
            | Error::FriendMisaligned { .. } => 11,
            Error::Kernel { .. } => 12,
            Error::Sink(_) | Error::Io(_) | Error::Json(_) | Error::Storage(_) => 13,
            Error::ThreadPool(_) => 99,
        }
    }

    pub(crate) fn schema(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::SchemaMismatch {
            column: column.into(),
            reason: reason.into(),
        }
    }
}

/// Failure raised by a per-event kernel (network, matrix element, likelihood).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct KernelError(pub String);

impl KernelError {
    pub fn new(msg: impl Into<String>) -> Self {
        KernelError(msg.into())
    }
}
