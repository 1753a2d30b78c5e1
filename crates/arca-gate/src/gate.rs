use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::GateConfig;
use crate::context::{Context, Operation, ResourceAttributes};
use crate::error::AuthzError;
use crate::stage::{PolicyStage, StageDecision, StageResult};
use crate::stages::{DenyOperationsStage, OwnerOnlyStage, ReadOnlyStage, RequireRoleStage};

// ---------------------------------------------------------------------------
// Authorizer trait
// ---------------------------------------------------------------------------

/// Decides whether a caller may run an operation.
///
/// Called once per public management operation, before any storage access.
pub trait Authorizer: Send + Sync {
    fn enforce(
        &self,
        context: &Context,
        operation: Operation,
        resource: &ResourceAttributes,
    ) -> Result<(), AuthzError>;
}

/// Authorizer that allows everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct PermitAll;

impl Authorizer for PermitAll {
    fn enforce(
        &self,
        _context: &Context,
        _operation: Operation,
        _resource: &ResourceAttributes,
    ) -> Result<(), AuthzError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// GateOutcome
// ---------------------------------------------------------------------------

/// The outcome of running an operation through the full pipeline.
#[derive(Clone, Debug)]
pub struct GateOutcome {
    /// First denial reason, if any stage refused.
    pub denial: Option<String>,
    /// Per-stage results in evaluation order.
    pub stage_results: Vec<StageResult>,
    pub elapsed: Duration,
}

impl GateOutcome {
    pub fn is_permitted(&self) -> bool {
        self.denial.is_none()
    }
}

// ---------------------------------------------------------------------------
// PolicyGate
// ---------------------------------------------------------------------------

/// A configurable pipeline of stages that every operation passes through.
pub struct PolicyGate {
    stages: Vec<Box<dyn PolicyStage>>,
    permissive: bool,
}

impl PolicyGate {
    /// A gate with an empty pipeline, which permits everything.
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            permissive: false,
        }
    }

    /// Build the pipeline described by `config`:
    /// ReadOnly -> DenyOperations -> RequireRole -> OwnerOnly,
    /// each stage present only when configured.
    pub fn from_config(config: &GateConfig) -> Self {
        let mut gate = Self::new();
        gate.permissive = config.permissive;
        if config.read_only {
            gate.add_stage(Box::new(ReadOnlyStage));
        }
        if !config.denied_operations.is_empty() {
            gate.add_stage(Box::new(DenyOperationsStage::new(
                config.denied_operations.iter().copied(),
            )));
        }
        if !config.required_roles.is_empty() {
            gate.add_stage(Box::new(RequireRoleStage::new(config.required_roles.clone())));
        }
        if config.owner_only {
            gate.add_stage(Box::new(OwnerOnlyStage::new(config.admin_role.clone())));
        }
        gate
    }

    /// Append a stage to the end of the pipeline.
    pub fn add_stage(&mut self, stage: Box<dyn PolicyStage>) {
        self.stages.push(stage);
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Run the pipeline.
    ///
    /// The pipeline is **fail-fast**: the first denying stage stops
    /// evaluation. In permissive mode no stage runs.
    pub fn evaluate(
        &self,
        context: &Context,
        operation: Operation,
        resource: &ResourceAttributes,
    ) -> Result<GateOutcome, AuthzError> {
        let pipeline_start = Instant::now();
        if self.permissive {
            return Ok(GateOutcome {
                denial: None,
                stage_results: Vec::new(),
                elapsed: pipeline_start.elapsed(),
            });
        }

        let mut stage_results = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            let stage_start = Instant::now();
            let decision = stage.evaluate(context, operation, resource)?;
            let reason = match &decision {
                StageDecision::Pass => None,
                StageDecision::Deny { reason } => Some(reason.clone()),
            };
            stage_results.push(StageResult {
                stage_name: stage.name().to_string(),
                passed: reason.is_none(),
                reason: reason.clone(),
                elapsed: stage_start.elapsed(),
            });

            if reason.is_some() {
                debug!(stage = stage.name(), %operation, subject = %context.subject, "operation denied");
                return Ok(GateOutcome {
                    denial: reason,
                    stage_results,
                    elapsed: pipeline_start.elapsed(),
                });
            }
        }

        Ok(GateOutcome {
            denial: None,
            stage_results,
            elapsed: pipeline_start.elapsed(),
        })
    }
}

impl Default for PolicyGate {
    fn default() -> Self {
        Self::new()
    }
}

impl Authorizer for PolicyGate {
    fn enforce(
        &self,
        context: &Context,
        operation: Operation,
        resource: &ResourceAttributes,
    ) -> Result<(), AuthzError> {
        let outcome = self.evaluate(context, operation, resource)?;
        match outcome.denial {
            None => Ok(()),
            Some(reason) => Err(AuthzError::Denied {
                operation,
                subject: context.subject.clone(),
                reason,
            }),
        }
    }
}

impl std::fmt::Debug for PolicyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.stages.iter().map(|s| s.name()).collect();
        f.debug_struct("PolicyGate")
            .field("stages", &names)
            .field("permissive", &self.permissive)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// A stage that always errors, to check error propagation.
    struct BrokenStage;

    impl PolicyStage for BrokenStage {
        fn name(&self) -> &str {
            "broken"
        }

        fn evaluate(
            &self,
            _context: &Context,
            _operation: Operation,
            _resource: &ResourceAttributes,
        ) -> Result<StageDecision, AuthzError> {
            Err(AuthzError::stage("broken", "policy source unavailable"))
        }
    }

    fn any_resource() -> ResourceAttributes {
        ResourceAttributes::default()
    }

    // -----------------------------------------------------------------------
    // Pipeline construction
    // -----------------------------------------------------------------------

    #[test]
    fn default_config_has_no_stages() {
        let gate = PolicyGate::from_config(&GateConfig::default());
        assert_eq!(gate.stage_count(), 0);
        assert!(gate.enforce(&Context::anonymous(), Operation::PurgeObject, &any_resource()).is_ok());
    }

    #[test]
    fn full_config_builds_every_stage() {
        let config = GateConfig {
            read_only: true,
            denied_operations: vec![Operation::Export],
            required_roles: BTreeMap::from([(Operation::GetNextPid, "admin".to_string())]),
            owner_only: true,
            ..GateConfig::default()
        };
        let gate = PolicyGate::from_config(&config);
        assert_eq!(gate.stage_count(), 4);
    }

    // -----------------------------------------------------------------------
    // Evaluation
    // -----------------------------------------------------------------------

    #[test]
    fn fail_fast_stops_at_first_denial() {
        let mut gate = PolicyGate::new();
        gate.add_stage(Box::new(ReadOnlyStage));
        gate.add_stage(Box::new(BrokenStage));
        let outcome = gate
            .evaluate(&Context::new("alice"), Operation::Ingest, &any_resource())
            .unwrap();
        assert!(!outcome.is_permitted());
        assert_eq!(outcome.stage_results.len(), 1);
        assert_eq!(outcome.stage_results[0].stage_name, "read-only");
    }

    #[test]
    fn stage_errors_propagate() {
        let mut gate = PolicyGate::new();
        gate.add_stage(Box::new(BrokenStage));
        let err = gate
            .enforce(&Context::new("alice"), Operation::GetDatastream, &any_resource())
            .unwrap_err();
        assert!(matches!(err, AuthzError::Stage { .. }));
    }

    #[test]
    fn permissive_skips_stages() {
        let mut gate = PolicyGate::from_config(&GateConfig::permissive());
        gate.add_stage(Box::new(BrokenStage));
        let outcome = gate
            .evaluate(&Context::new("alice"), Operation::PurgeObject, &any_resource())
            .unwrap();
        assert!(outcome.is_permitted());
        assert!(outcome.stage_results.is_empty());
    }

    #[test]
    fn denial_names_operation_and_subject() {
        let gate = PolicyGate::from_config(&GateConfig {
            denied_operations: vec![Operation::PurgeObject],
            ..GateConfig::default()
        });
        let err = gate
            .enforce(&Context::new("bob"), Operation::PurgeObject, &any_resource())
            .unwrap_err();
        assert_eq!(err.to_string(), "bob may not purgeObject: purgeObject is disabled");
    }

    #[test]
    fn config_deserializes_from_json() {
        let config: GateConfig = serde_json::from_str(
            r#"{"read_only": false, "denied_operations": ["purgeObject"], "required_roles": {"getNextPid": "admin"}}"#,
        )
        .unwrap();
        assert_eq!(config.denied_operations, vec![Operation::PurgeObject]);
        assert_eq!(config.required_roles.get(&Operation::GetNextPid).map(String::as_str), Some("admin"));
        assert_eq!(config.admin_role, "administrator");
    }

    #[test]
    fn permit_all_permits() {
        assert!(PermitAll
            .enforce(&Context::anonymous(), Operation::PurgeObject, &any_resource())
            .is_ok());
    }
}
