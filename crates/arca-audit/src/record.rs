use std::fmt;

use arca_types::Timestamp;
use serde::{Deserialize, Serialize};

/// The kind of mutation an audit record describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuditAction {
    Ingest,
    ModifyObject,
    PurgeObject,
    AddDatastream,
    ModifyDatastreamByValue,
    ModifyDatastreamByReference,
    PurgeDatastream,
    SetDatastreamState,
    SetDatastreamVersionable,
    AddRelationship,
    PurgeRelationship,
}

impl AuditAction {
    /// The operation name as it appears in exported trails.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::ModifyObject => "modifyObject",
            Self::PurgeObject => "purgeObject",
            Self::AddDatastream => "addDatastream",
            Self::ModifyDatastreamByValue => "modifyDatastreamByValue",
            Self::ModifyDatastreamByReference => "modifyDatastreamByReference",
            Self::PurgeDatastream => "purgeDatastream",
            Self::SetDatastreamState => "setDatastreamState",
            Self::SetDatastreamVersionable => "setDatastreamVersionable",
            Self::AddRelationship => "addRelationship",
            Self::PurgeRelationship => "purgeRelationship",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller supplies when recording a mutation.
///
/// The trail assigns the record id; everything else comes from here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditEntry {
    pub action: AuditAction,
    /// Affected component (datastream id), if any.
    pub component_id: Option<String>,
    /// Subject responsible for the change.
    pub responsibility: String,
    /// When the change took effect.
    pub date: Timestamp,
    /// Free-text justification supplied by the caller.
    pub justification: String,
}

impl AuditEntry {
    pub fn new(
        action: AuditAction,
        responsibility: impl Into<String>,
        date: Timestamp,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            action,
            component_id: None,
            responsibility: responsibility.into(),
            date,
            justification: justification.into(),
        }
    }

    pub fn with_component(mut self, component_id: impl Into<String>) -> Self {
        self.component_id = Some(component_id.into());
        self
    }
}

/// An immutable audit record as stored with the object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// `AUDREC{n}`, unique and increasing within the object.
    pub id: String,
    pub action: AuditAction,
    pub component_id: Option<String>,
    pub responsibility: String,
    pub date: Timestamp,
    pub justification: String,
}

impl AuditRecord {
    /// Numeric part of the record id.
    pub fn sequence(&self) -> Option<u64> {
        self.id.strip_prefix(crate::trail::RECORD_ID_PREFIX)?.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn action_names() {
        assert_eq!(AuditAction::ModifyDatastreamByReference.as_str(), "modifyDatastreamByReference");
        assert_eq!(AuditAction::Ingest.to_string(), "ingest");
    }

    #[test]
    fn action_serializes_camel_case() {
        let json = serde_json::to_string(&AuditAction::SetDatastreamVersionable).unwrap();
        assert_eq!(json, "\"setDatastreamVersionable\"");
    }

    #[test]
    fn entry_builder() {
        let entry = AuditEntry::new(AuditAction::AddDatastream, "alice", Utc::now(), "initial load")
            .with_component("DS1");
        assert_eq!(entry.component_id.as_deref(), Some("DS1"));
        assert_eq!(entry.responsibility, "alice");
    }
}
