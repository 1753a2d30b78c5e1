/// Errors produced by audit trail operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuditError {
    #[error("audit record {id} would be appended out of order: {reason}")]
    OutOfOrder { id: String, reason: String },

    #[error("malformed audit record id: {0}")]
    MalformedId(String),
}
