//! Object serialization in the `arca-json-1.0` format.
//!
//! The record mirrors [`DigitalObject`] field for field. Every field except
//! the datastream list is optional on input so that hand-written ingest
//! documents can stay small.

use std::fmt;

use arca_audit::AuditTrail;
use arca_rels::RelationshipSet;
use arca_types::{ObjectState, Pid, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::object::{Datastream, DigitalObject};

/// Format URI of the native JSON serialization.
pub const ARCA_JSON_FORMAT: &str = "info:arca/format/arca-json-1.0";

const ARCA_JSON_SHORT: &str = "arca-json-1.0";
const UTF8: &str = "UTF-8";

/// Supported serialization formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectFormat {
    ArcaJson,
}

impl ObjectFormat {
    /// Resolve a format URI or short name.
    pub fn parse(format: &str) -> StoreResult<Self> {
        match format.trim() {
            ARCA_JSON_FORMAT | ARCA_JSON_SHORT => Ok(Self::ArcaJson),
            other => Err(StoreError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn uri(&self) -> &'static str {
        match self {
            Self::ArcaJson => ARCA_JSON_FORMAT,
        }
    }
}

impl fmt::Display for ObjectFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri())
    }
}

/// Fail unless `encoding` names UTF-8.
pub fn check_encoding(encoding: &str) -> StoreResult<()> {
    let normalized = encoding.trim().to_ascii_uppercase().replace('_', "-");
    if normalized == UTF8 || normalized == "UTF8" {
        Ok(())
    } else {
        Err(StoreError::UnsupportedEncoding(encoding.to_string()))
    }
}

/// Wire form of a digital object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRecord {
    #[serde(default)]
    pub pid: Option<Pid>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub state: Option<ObjectState>,
    #[serde(default)]
    pub created: Option<Timestamp>,
    #[serde(default)]
    pub last_modified: Option<Timestamp>,
    #[serde(default)]
    pub datastreams: Vec<Datastream>,
    #[serde(default)]
    pub audit_trail: AuditTrail,
    #[serde(default)]
    pub relationships: RelationshipSet,
}

impl ObjectRecord {
    /// Snapshot an object for export.
    pub fn from_object(object: &DigitalObject) -> Self {
        Self {
            pid: Some(object.pid.clone()),
            label: object.label.clone(),
            owner_id: Some(object.owner_id.clone()),
            state: Some(object.state),
            created: Some(object.created),
            last_modified: Some(object.last_modified),
            datastreams: object.datastreams().cloned().collect(),
            audit_trail: object.audit_trail.clone(),
            relationships: object.relationships.clone(),
        }
    }

    /// Build an object under `pid`. Missing dates default to `now` and a
    /// missing owner to the empty string.
    pub fn into_object(self, pid: Pid, now: Timestamp) -> DigitalObject {
        let created = self.created.unwrap_or(now);
        let mut object = DigitalObject::new(pid, self.label, self.owner_id.unwrap_or_default(), created);
        object.state = self.state.unwrap_or(ObjectState::Active);
        object.last_modified = self.last_modified.unwrap_or(created);
        object.audit_trail = self.audit_trail;
        object.relationships = self.relationships;
        for mut datastream in self.datastreams {
            datastream.normalize();
            object.insert_datastream(datastream);
        }
        object
    }

    /// Parse a serialization in the given format and encoding.
    pub fn decode(bytes: &[u8], format: &str, encoding: &str) -> StoreResult<Self> {
        check_encoding(encoding)?;
        match ObjectFormat::parse(format)? {
            ObjectFormat::ArcaJson => serde_json::from_slice(bytes)
                .map_err(|e| StoreError::Serialization(e.to_string())),
        }
    }

    /// Produce a serialization in the given format and encoding.
    pub fn encode(&self, format: &str, encoding: &str) -> StoreResult<Vec<u8>> {
        check_encoding(encoding)?;
        match ObjectFormat::parse(format)? {
            ObjectFormat::ArcaJson => serde_json::to_vec_pretty(self)
                .map_err(|e| StoreError::Serialization(e.to_string())),
        }
    }
}
