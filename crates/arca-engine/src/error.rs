use std::fmt;

use arca_audit::AuditError;
use arca_crypto::ChecksumError;
use arca_gate::AuthzError;
use arca_pid::PidError;
use arca_rels::RelError;
use arca_staging::StagingError;
use arca_store::StoreError;
use arca_types::TypeError;

use crate::content::FetchError;
use crate::xml::XmlError;

/// Failure category of a management operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input: identifiers, XML, checksums, labels, wrong method
    /// for the control group.
    Validation,
    /// Illegal transition for the current object or datastream state.
    State,
    /// Unknown PID, datastream or upload handle.
    NotFound,
    /// Refused by the authorizer before anything was touched.
    Authorization,
    /// I/O failure in storage or persistence. The whole operation may be
    /// retried.
    Storage,
    /// An option that is accepted by the interface but not implemented.
    Unsupported,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::State => "state",
            Self::NotFound => "not-found",
            Self::Authorization => "authorization",
            Self::Storage => "storage",
            Self::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

/// Errors returned by every management operation.
#[derive(Debug, thiserror::Error)]
pub enum ManagementError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("illegal state: {0}")]
    State(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("authorization denied: {0}")]
    Authorization(#[from] AuthzError),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("not yet supported: {0}")]
    Unsupported(String),
}

impl ManagementError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::State(_) => ErrorKind::State,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Authorization(_) => ErrorKind::Authorization,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Unsupported(_) => ErrorKind::Unsupported,
        }
    }

    /// Whether a batch of operations should stop at this failure.
    ///
    /// Storage failures abort a batch; every other kind is local to the one
    /// item that caused it.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Storage
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn state(message: impl Into<String>) -> Self {
        Self::State(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

/// Result alias for management operations.
pub type ManagementResult<T> = Result<T, ManagementError>;

// ---------------------------------------------------------------------------
// Conversions from lower layers
// ---------------------------------------------------------------------------

impl From<TypeError> for ManagementError {
    fn from(e: TypeError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<ChecksumError> for ManagementError {
    fn from(e: ChecksumError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<RelError> for ManagementError {
    fn from(e: RelError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<XmlError> for ManagementError {
    fn from(e: XmlError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<AuditError> for ManagementError {
    fn from(e: AuditError) -> Self {
        Self::State(e.to_string())
    }
}

impl From<StoreError> for ManagementError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) | StoreError::ContentNotFound(_) => Self::NotFound(e.to_string()),
            StoreError::AlreadyExists(_)
            | StoreError::UnsupportedFormat(_)
            | StoreError::UnsupportedEncoding(_)
            | StoreError::Serialization(_) => Self::Validation(e.to_string()),
            StoreError::LockTimeout { .. } | StoreError::Io(_) => Self::Storage(e.to_string()),
        }
    }
}

impl From<PidError> for ManagementError {
    fn from(e: PidError) -> Self {
        match e {
            PidError::Invalid(_) => Self::Validation(e.to_string()),
            PidError::Io(_)
            | PidError::Serialization(_)
            | PidError::Corrupt { .. }
            | PidError::Exhausted(_) => Self::Storage(e.to_string()),
        }
    }
}

impl From<StagingError> for ManagementError {
    fn from(e: StagingError) -> Self {
        match e {
            StagingError::NotFound(_) => Self::NotFound(e.to_string()),
            StagingError::Malformed(_) => Self::Validation(e.to_string()),
            StagingError::Io(_) => Self::Storage(e.to_string()),
        }
    }
}

impl From<FetchError> for ManagementError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::NotFound(_) => Self::NotFound(e.to_string()),
            FetchError::UnsupportedScheme(_) => Self::Validation(e.to_string()),
            FetchError::Io(_) => Self::Storage(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arca_types::Pid;
    use std::io;
    use std::time::Duration;

    #[test]
    fn kinds_follow_variants() {
        assert_eq!(ManagementError::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(ManagementError::Unsupported("force".into()).kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn only_storage_is_fatal() {
        assert!(ManagementError::Storage("disk".into()).is_fatal());
        assert!(!ManagementError::state("deleted").is_fatal());
        assert!(!ManagementError::not_found("demo:1").is_fatal());
    }

    #[test]
    fn store_errors_map_to_kinds() {
        let pid = Pid::parse("demo:1").unwrap();
        assert_eq!(ManagementError::from(StoreError::NotFound(pid.clone())).kind(), ErrorKind::NotFound);
        assert_eq!(
            ManagementError::from(StoreError::LockTimeout { pid, waited: Duration::from_secs(1) }).kind(),
            ErrorKind::Storage
        );
        assert_eq!(
            ManagementError::from(StoreError::Io(io::Error::new(io::ErrorKind::Other, "x"))).kind(),
            ErrorKind::Storage
        );
    }

    #[test]
    fn staging_errors_map_to_kinds() {
        assert_eq!(ManagementError::from(StagingError::NotFound(3)).kind(), ErrorKind::NotFound);
        assert_eq!(
            ManagementError::from(StagingError::Malformed("x".into())).kind(),
            ErrorKind::Validation
        );
    }
}
