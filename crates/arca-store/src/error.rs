use std::time::Duration;

use arca_types::Pid;

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No object with this PID exists.
    #[error("object not found: {0}")]
    NotFound(Pid),

    /// An object with this PID already exists.
    #[error("object already exists: {0}")]
    AlreadyExists(Pid),

    /// Managed content is missing for an internal location.
    #[error("content not found at location {0}")]
    ContentNotFound(String),

    /// Another writer held the object for longer than the lock timeout.
    #[error("timed out after {waited:?} waiting for the writer lock on {pid}")]
    LockTimeout { pid: Pid, waited: Duration },

    /// The serialization format is not supported.
    #[error("unsupported serialization format: {0}")]
    UnsupportedFormat(String),

    /// The character encoding is not supported.
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
