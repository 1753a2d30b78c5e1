use std::time::Duration;

use crate::context::{Context, Operation, ResourceAttributes};
use crate::error::AuthzError;

// ---------------------------------------------------------------------------
// StageDecision
// ---------------------------------------------------------------------------

/// The outcome of a single policy stage evaluation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageDecision {
    /// The stage has no objection; proceed to the next stage.
    Pass,
    /// The stage refuses the operation.
    Deny { reason: String },
}

impl StageDecision {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self::Deny {
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// StageResult
// ---------------------------------------------------------------------------

/// Recorded result from a completed stage evaluation.
#[derive(Clone, Debug)]
pub struct StageResult {
    pub stage_name: String,
    pub passed: bool,
    /// Populated on denial.
    pub reason: Option<String>,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// PolicyStage trait
// ---------------------------------------------------------------------------

/// A single evaluation stage in the authorization pipeline.
///
/// The trait is object-safe and `Send + Sync` so stages can be stored in a
/// `Vec<Box<dyn PolicyStage>>`.
pub trait PolicyStage: Send + Sync {
    /// Human-readable name of this stage (e.g. "read-only", "owner-only").
    fn name(&self) -> &str;

    fn evaluate(
        &self,
        context: &Context,
        operation: Operation,
        resource: &ResourceAttributes,
    ) -> Result<StageDecision, AuthzError>;
}
