use std::collections::BTreeSet;
use std::fmt;

use arca_types::Pid;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// Every management operation that passes through authorization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Ingest,
    ModifyObject,
    PurgeObject,
    Export,
    GetObjectXml,
    GetObjectProfile,
    GetObjectHistory,
    AddDatastream,
    ModifyDatastreamByValue,
    ModifyDatastreamByReference,
    PurgeDatastream,
    SetDatastreamState,
    SetDatastreamVersionable,
    CompareDatastreamChecksum,
    GetDatastream,
    GetDatastreams,
    GetDatastreamHistory,
    GetDatastreamContent,
    GetRelationships,
    AddRelationship,
    PurgeRelationship,
    GetNextPid,
    Upload,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::ModifyObject => "modifyObject",
            Self::PurgeObject => "purgeObject",
            Self::Export => "export",
            Self::GetObjectXml => "getObjectXml",
            Self::GetObjectProfile => "getObjectProfile",
            Self::GetObjectHistory => "getObjectHistory",
            Self::AddDatastream => "addDatastream",
            Self::ModifyDatastreamByValue => "modifyDatastreamByValue",
            Self::ModifyDatastreamByReference => "modifyDatastreamByReference",
            Self::PurgeDatastream => "purgeDatastream",
            Self::SetDatastreamState => "setDatastreamState",
            Self::SetDatastreamVersionable => "setDatastreamVersionable",
            Self::CompareDatastreamChecksum => "compareDatastreamChecksum",
            Self::GetDatastream => "getDatastream",
            Self::GetDatastreams => "getDatastreams",
            Self::GetDatastreamHistory => "getDatastreamHistory",
            Self::GetDatastreamContent => "getDatastreamContent",
            Self::GetRelationships => "getRelationships",
            Self::AddRelationship => "addRelationship",
            Self::PurgeRelationship => "purgeRelationship",
            Self::GetNextPid => "getNextPid",
            Self::Upload => "upload",
        }
    }

    /// Whether the operation leaves every object untouched.
    ///
    /// `GetNextPid` and `Upload` change repository state (the PID table and
    /// the staging area) and therefore count as mutations.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Self::Export
                | Self::GetObjectXml
                | Self::GetObjectProfile
                | Self::GetObjectHistory
                | Self::CompareDatastreamChecksum
                | Self::GetDatastream
                | Self::GetDatastreams
                | Self::GetDatastreamHistory
                | Self::GetDatastreamContent
                | Self::GetRelationships
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Who is calling, carried through every management operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Context {
    /// Responsible subject, recorded in audit records.
    pub subject: String,
    pub roles: BTreeSet<String>,
    /// Correlates log lines of one request.
    pub request_id: Uuid,
}

impl Context {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            roles: BTreeSet::new(),
            request_id: Uuid::now_v7(),
        }
    }

    pub fn anonymous() -> Self {
        Self::new("anonymous")
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

// ---------------------------------------------------------------------------
// ResourceAttributes
// ---------------------------------------------------------------------------

/// What the operation touches, as far as it is known before any storage
/// access.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceAttributes {
    pub pid: Option<Pid>,
    pub datastream_id: Option<String>,
    /// Owner of the target object, when the caller has looked it up.
    pub owner_id: Option<String>,
}

impl ResourceAttributes {
    pub fn object(pid: &Pid) -> Self {
        Self {
            pid: Some(pid.clone()),
            ..Self::default()
        }
    }

    pub fn datastream(pid: &Pid, datastream_id: impl Into<String>) -> Self {
        Self {
            pid: Some(pid.clone()),
            datastream_id: Some(datastream_id.into()),
            owner_id: None,
        }
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_names() {
        assert_eq!(Operation::ModifyDatastreamByReference.to_string(), "modifyDatastreamByReference");
        let json = serde_json::to_string(&Operation::GetNextPid).unwrap();
        assert_eq!(json, "\"getNextPid\"");
    }

    #[test]
    fn read_only_classification() {
        assert!(Operation::GetDatastreamContent.is_read_only());
        assert!(!Operation::GetNextPid.is_read_only());
        assert!(!Operation::AddRelationship.is_read_only());
    }

    #[test]
    fn context_roles_and_request_ids() {
        let a = Context::new("alice").with_role("curator");
        let b = Context::new("alice");
        assert!(a.has_role("curator"));
        assert!(!b.has_role("curator"));
        assert_ne!(a.request_id, b.request_id);
    }
}
