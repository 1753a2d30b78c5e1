use std::collections::{BTreeMap, BTreeSet};

use crate::context::{Context, Operation, ResourceAttributes};
use crate::error::AuthzError;
use crate::stage::{PolicyStage, StageDecision};

/// Refuses every mutating operation.
pub struct ReadOnlyStage;

impl PolicyStage for ReadOnlyStage {
    fn name(&self) -> &str {
        "read-only"
    }

    fn evaluate(
        &self,
        _context: &Context,
        operation: Operation,
        _resource: &ResourceAttributes,
    ) -> Result<StageDecision, AuthzError> {
        if operation.is_read_only() {
            Ok(StageDecision::Pass)
        } else {
            Ok(StageDecision::deny("repository is read-only"))
        }
    }
}

/// Refuses a fixed set of operations to everyone.
pub struct DenyOperationsStage {
    denied: BTreeSet<Operation>,
}

impl DenyOperationsStage {
    pub fn new(denied: impl IntoIterator<Item = Operation>) -> Self {
        Self {
            denied: denied.into_iter().collect(),
        }
    }
}

impl PolicyStage for DenyOperationsStage {
    fn name(&self) -> &str {
        "deny-operations"
    }

    fn evaluate(
        &self,
        _context: &Context,
        operation: Operation,
        _resource: &ResourceAttributes,
    ) -> Result<StageDecision, AuthzError> {
        if self.denied.contains(&operation) {
            Ok(StageDecision::deny(format!("{operation} is disabled")))
        } else {
            Ok(StageDecision::Pass)
        }
    }
}

/// Requires the caller to hold a role for selected operations.
pub struct RequireRoleStage {
    required: BTreeMap<Operation, String>,
}

impl RequireRoleStage {
    pub fn new(required: BTreeMap<Operation, String>) -> Self {
        Self { required }
    }
}

impl PolicyStage for RequireRoleStage {
    fn name(&self) -> &str {
        "require-role"
    }

    fn evaluate(
        &self,
        context: &Context,
        operation: Operation,
        _resource: &ResourceAttributes,
    ) -> Result<StageDecision, AuthzError> {
        match self.required.get(&operation) {
            Some(role) if !context.has_role(role) => {
                Ok(StageDecision::deny(format!("role '{role}' required")))
            }
            _ => Ok(StageDecision::Pass),
        }
    }
}
