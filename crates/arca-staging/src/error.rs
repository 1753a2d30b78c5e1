use std::io;

/// Errors produced by the upload staging area.
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    /// The handle was never issued, has expired, or was already consumed.
    #[error("upload {0} not found")]
    NotFound(u64),

    /// The handle or upload location is not well formed.
    #[error("malformed upload handle: {0}")]
    Malformed(String),

    /// I/O error in the staging directory.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience alias used throughout the staging crate.
pub type StagingResult<T> = std::result::Result<T, StagingError>;
