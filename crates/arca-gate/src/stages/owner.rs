use crate::context::{Context, Operation, ResourceAttributes};
use crate::error::AuthzError;
use crate::stage::{PolicyStage, StageDecision};

/// Only the owner of an object, or a holder of the admin role, may mutate
/// it.
///
/// Operations that do not name an existing object (ingest, PID issue,
/// uploads) and reads are not restricted. When the owner is unknown the
/// stage passes; callers that want the check enforced must fill in
/// [`ResourceAttributes::owner_id`].
pub struct OwnerOnlyStage {
    admin_role: String,
}

impl OwnerOnlyStage {
    pub fn new(admin_role: impl Into<String>) -> Self {
        Self {
            admin_role: admin_role.into(),
        }
    }
}

impl PolicyStage for OwnerOnlyStage {
    fn name(&self) -> &str {
        "owner-only"
    }

    fn evaluate(
        &self,
        context: &Context,
        operation: Operation,
        resource: &ResourceAttributes,
    ) -> Result<StageDecision, AuthzError> {
        if operation.is_read_only() || context.has_role(&self.admin_role) {
            return Ok(StageDecision::Pass);
        }
        match &resource.owner_id {
            Some(owner) if owner != &context.subject => Ok(StageDecision::deny(format!(
                "object is owned by '{owner}'"
            ))),
            _ => Ok(StageDecision::Pass),
        }
    }
}
