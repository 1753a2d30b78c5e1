//! Authorization for Arca management operations.
//!
//! Every public management operation asks an [`Authorizer`] for permission
//! before it touches storage. A denial aborts the operation with no side
//! effects. The stock authorizer is a [`PolicyGate`]: a fail-fast pipeline
//! of [`PolicyStage`]s built from a [`GateConfig`].
//!
//! # Quick Start
//!
//! ```rust
//! use arca_gate::{Authorizer, Context, GateConfig, Operation, PolicyGate, ResourceAttributes};
//!
//! let config = GateConfig { read_only: true, ..GateConfig::default() };
//! let gate = PolicyGate::from_config(&config);
//! let ctx = Context::new("alice");
//! let resource = ResourceAttributes::default();
//! assert!(gate.enforce(&ctx, Operation::GetObjectProfile, &resource).is_ok());
//! assert!(gate.enforce(&ctx, Operation::PurgeObject, &resource).is_err());
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod gate;
pub mod stage;
pub mod stages;

pub use config::GateConfig;
pub use context::{Context, Operation, ResourceAttributes};
pub use error::AuthzError;
pub use gate::{Authorizer, GateOutcome, PermitAll, PolicyGate};
pub use stage::{PolicyStage, StageDecision, StageResult};
pub use stages::{DenyOperationsStage, OwnerOnlyStage, ReadOnlyStage, RequireRoleStage};
