use thiserror::Error;

/// Errors produced while parsing or validating foundation types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid PID '{value}': {reason}")]
    InvalidPid { value: String, reason: String },

    #[error("invalid datastream id '{value}': {reason}")]
    InvalidDatastreamId { value: String, reason: String },

    #[error("invalid label: {0}")]
    InvalidLabel(String),

    #[error("unknown {kind} value '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
}
