use std::io;

use arca_types::TypeError;

/// Errors produced by PID generation and persistence.
#[derive(Debug, thiserror::Error)]
pub enum PidError {
    /// The namespace or a reserved PID is malformed.
    #[error("invalid pid: {0}")]
    Invalid(#[from] TypeError),

    /// I/O error while reading or writing the PID table.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A table row could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A complete row before the end of the table failed its integrity
    /// check. Loading refuses rather than lose a high-water mark.
    #[error("pid table corrupt at byte {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    /// The namespace's counter cannot grow any further.
    #[error("namespace {0} has exhausted its numeric suffixes")]
    Exhausted(String),
}

/// Convenience alias used throughout the pid crate.
pub type PidResult<T> = std::result::Result<T, PidError>;
