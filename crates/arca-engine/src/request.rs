use arca_store::DatastreamVersion;
use arca_types::{ControlGroup, DatastreamId, DatastreamState, ObjectState, Pid, Timestamp};
use serde::{Deserialize, Serialize};

/// Content of a new datastream version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentSource {
    /// XML bytes, for inline XML datastreams.
    Inline(Vec<u8>),
    /// A URL, `uploaded://N` handle or internal location.
    Location(String),
}

/// Parameters of `addDatastream`.
#[derive(Clone, Debug)]
pub struct AddDatastream {
    /// Generated as the smallest free `DS{n}` when absent.
    pub id: Option<String>,
    pub control_group: ControlGroup,
    pub versionable: bool,
    pub label: String,
    pub mime_type: String,
    pub format_uri: Option<String>,
    pub source: ContentSource,
    pub state: DatastreamState,
    pub alt_ids: Vec<String>,
    /// `DEFAULT`, `DISABLED` or a registered type. Falls back to the
    /// configured default when auto-checksumming is on, `DISABLED` otherwise.
    pub checksum_type: Option<String>,
    /// Expected value; the add fails when the computed checksum differs.
    pub checksum: Option<String>,
    pub log_message: String,
}

impl AddDatastream {
    fn with_source(control_group: ControlGroup, source: ContentSource) -> Self {
        Self {
            id: None,
            control_group,
            versionable: true,
            label: String::new(),
            mime_type: String::new(),
            format_uri: None,
            source,
            state: DatastreamState::Active,
            alt_ids: Vec::new(),
            checksum_type: None,
            checksum: None,
            log_message: String::new(),
        }
    }

    pub fn inline(xml: impl Into<Vec<u8>>) -> Self {
        Self::with_source(ControlGroup::InlineXml, ContentSource::Inline(xml.into()))
    }

    pub fn managed(location: impl Into<String>) -> Self {
        Self::with_source(ControlGroup::ManagedContent, ContentSource::Location(location.into()))
    }

    pub fn external(location: impl Into<String>) -> Self {
        Self::with_source(
            ControlGroup::ExternallyReferenced,
            ContentSource::Location(location.into()),
        )
    }

    pub fn redirect(location: impl Into<String>) -> Self {
        Self::with_source(ControlGroup::Redirect, ContentSource::Location(location.into()))
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn with_format_uri(mut self, format_uri: impl Into<String>) -> Self {
        self.format_uri = Some(format_uri.into());
        self
    }

    pub fn with_state(mut self, state: DatastreamState) -> Self {
        self.state = state;
        self
    }

    pub fn with_versionable(mut self, versionable: bool) -> Self {
        self.versionable = versionable;
        self
    }

    pub fn with_alt_id(mut self, alt_id: impl Into<String>) -> Self {
        self.alt_ids.push(alt_id.into());
        self
    }

    pub fn with_checksum_type(mut self, checksum_type: impl Into<String>) -> Self {
        self.checksum_type = Some(checksum_type.into());
        self
    }

    pub fn with_checksum(mut self, checksum_type: impl Into<String>, checksum: impl Into<String>) -> Self {
        self.checksum_type = Some(checksum_type.into());
        self.checksum = Some(checksum.into());
        self
    }

    pub fn with_log_message(mut self, message: impl Into<String>) -> Self {
        self.log_message = message.into();
        self
    }
}

/// Parameters of `modifyDatastreamByValue` and
/// `modifyDatastreamByReference`.
///
/// `None` inherits the value of the current version. An explicit empty
/// string clears a label, MIME type or format URI.
#[derive(Clone, Debug, Default)]
pub struct ModifyDatastream {
    pub id: String,
    pub label: Option<String>,
    pub mime_type: Option<String>,
    pub format_uri: Option<String>,
    pub alt_ids: Option<Vec<String>>,
    /// New XML, by value only.
    pub content: Option<Vec<u8>>,
    /// New location, by reference only. When absent on managed content the
    /// previous bytes are copied to the new version.
    pub location: Option<String>,
    pub checksum_type: Option<String>,
    pub checksum: Option<String>,
    pub log_message: String,
}

impl ModifyDatastream {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_format_uri(mut self, format_uri: impl Into<String>) -> Self {
        self.format_uri = Some(format_uri.into());
        self
    }

    pub fn with_alt_ids(mut self, alt_ids: Vec<String>) -> Self {
        self.alt_ids = Some(alt_ids);
        self
    }

    pub fn with_content(mut self, xml: impl Into<Vec<u8>>) -> Self {
        self.content = Some(xml.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_checksum_type(mut self, checksum_type: impl Into<String>) -> Self {
        self.checksum_type = Some(checksum_type.into());
        self
    }

    pub fn with_checksum(mut self, checksum_type: impl Into<String>, checksum: impl Into<String>) -> Self {
        self.checksum_type = Some(checksum_type.into());
        self.checksum = Some(checksum.into());
        self
    }

    pub fn with_log_message(mut self, message: impl Into<String>) -> Self {
        self.log_message = message.into();
        self
    }
}

/// Parameters of `modifyObject`. Only supplied fields change.
#[derive(Clone, Debug, Default)]
pub struct ModifyObject {
    pub state: Option<ObjectState>,
    pub label: Option<String>,
    pub owner_id: Option<String>,
    pub log_message: String,
}

impl ModifyObject {
    pub fn new(log_message: impl Into<String>) -> Self {
        Self {
            log_message: log_message.into(),
            ..Self::default()
        }
    }

    pub fn with_state(mut self, state: ObjectState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }
}

/// Parameters of `ingest`.
#[derive(Clone, Debug)]
pub struct IngestRequest {
    pub serialization: Vec<u8>,
    pub format: String,
    pub encoding: String,
    /// Audit justification. No audit record is written when absent.
    pub log_message: Option<String>,
    /// Assign a fresh PID even when the serialization carries one.
    pub new_pid: bool,
}

impl IngestRequest {
    /// An `arca-json-1.0`, UTF-8 ingest.
    pub fn json(serialization: impl Into<Vec<u8>>) -> Self {
        Self {
            serialization: serialization.into(),
            format: arca_store::ARCA_JSON_FORMAT.to_string(),
            encoding: "UTF-8".to_string(),
            log_message: None,
            new_pid: false,
        }
    }

    pub fn with_log_message(mut self, message: impl Into<String>) -> Self {
        self.log_message = Some(message.into());
        self
    }

    pub fn with_new_pid(mut self) -> Self {
        self.new_pid = true;
        self
    }
}

// ---------------------------------------------------------------------------
// Read models
// ---------------------------------------------------------------------------

/// Object properties returned by `getObjectProfile`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectProfile {
    pub pid: Pid,
    pub label: String,
    pub owner_id: String,
    pub state: ObjectState,
    pub created: Timestamp,
    pub last_modified: Timestamp,
    pub datastream_ids: Vec<DatastreamId>,
}

/// A datastream as seen at one point in time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatastreamProfile {
    pub id: DatastreamId,
    pub control_group: ControlGroup,
    pub state: DatastreamState,
    pub versionable: bool,
    pub version: DatastreamVersion,
}

/// Resolved bytes of one datastream version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatastreamContent {
    pub version_id: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_builder() {
        let request = AddDatastream::managed("http://x/y")
            .with_id("DS1")
            .with_label("payload")
            .with_checksum("SHA-256", "abc")
            .with_versionable(false);
        assert_eq!(request.control_group, ControlGroup::ManagedContent);
        assert_eq!(request.id.as_deref(), Some("DS1"));
        assert_eq!(request.checksum_type.as_deref(), Some("SHA-256"));
        assert!(!request.versionable);
        assert_eq!(request.state, DatastreamState::Active);
    }

    #[test]
    fn modify_defaults_inherit_everything() {
        let request = ModifyDatastream::new("DS1");
        assert!(request.label.is_none());
        assert!(request.location.is_none());
        assert!(request.content.is_none());
    }

    #[test]
    fn ingest_defaults_to_json() {
        let request = IngestRequest::json("{}").with_new_pid();
        assert_eq!(request.format, arca_store::ARCA_JSON_FORMAT);
        assert!(request.new_pid);
        assert!(request.log_message.is_none());
    }

    #[test]
    fn profile_serializes_camel_case() {
        let now = chrono::Utc::now();
        let profile = ObjectProfile {
            pid: Pid::parse("demo:1").unwrap(),
            label: "x".into(),
            owner_id: "alice".into(),
            state: ObjectState::Active,
            created: now,
            last_modified: now,
            datastream_ids: vec![DatastreamId::parse("DS1").unwrap()],
        };
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["pid"], "demo:1");
        assert_eq!(value["ownerId"], "alice");
        assert_eq!(value["datastreamIds"][0], "DS1");
    }
}
