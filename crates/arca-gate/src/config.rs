use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::context::Operation;

/// Configuration for the authorization pipeline.
///
/// An all-default configuration builds a gate with no stages, which permits
/// everything.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Skip every stage and permit all operations.
    pub permissive: bool,
    /// Refuse every operation that is not read-only.
    pub read_only: bool,
    /// Operations refused to everyone.
    pub denied_operations: Vec<Operation>,
    /// Operations that need the caller to hold a role.
    pub required_roles: BTreeMap<Operation, String>,
    /// Only an object's owner may mutate it.
    pub owner_only: bool,
    /// Role that bypasses the owner-only rule.
    pub admin_role: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            permissive: false,
            read_only: false,
            denied_operations: Vec::new(),
            required_roles: BTreeMap::new(),
            owner_only: false,
            admin_role: "administrator".into(),
        }
    }
}

impl GateConfig {
    /// A configuration that permits everything without evaluating stages.
    pub fn permissive() -> Self {
        Self {
            permissive: true,
            ..Default::default()
        }
    }
}
