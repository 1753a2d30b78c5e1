//! Error types for relationship operations.

use thiserror::Error;

/// Errors that can occur while building or storing relationships.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelError {
    /// A subject, predicate, or resource object is not a valid URI.
    #[error("invalid URI '{value}': {reason}")]
    InvalidUri { value: String, reason: String },

    /// A datatype was supplied for a resource (non-literal) object.
    #[error("datatype '{0}' is only meaningful for literal objects")]
    DatatypeOnResource(String),
}

/// Convenience type alias for relationship operations.
pub type Result<T> = std::result::Result<T, RelError>;
