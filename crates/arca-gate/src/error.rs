use crate::context::Operation;

/// Errors produced by authorization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// A policy refused the operation.
    #[error("{subject} may not {operation}: {reason}")]
    Denied {
        operation: Operation,
        subject: String,
        reason: String,
    },

    /// A stage could not reach a decision.
    #[error("stage error in '{stage}': {message}")]
    Stage { stage: String, message: String },
}

impl AuthzError {
    /// Create a stage error with a name and message.
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            message: message.into(),
        }
    }
}
