use std::collections::{BTreeMap, BTreeSet};

use arca_audit::AuditTrail;
use arca_rels::RelationshipSet;
use arca_types::{ControlGroup, DatastreamId, DatastreamState, ObjectState, Pid, Timestamp};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Content locations
// ---------------------------------------------------------------------------

/// Internal location of repository-managed content: `{pid}+{dsid}+{versionId}`.
pub fn internal_location(pid: &Pid, dsid: &DatastreamId, version_id: &str) -> String {
    format!("{pid}+{dsid}+{version_id}")
}

/// Whether a location names repository-managed content rather than a URL.
pub fn is_internal_location(location: &str) -> bool {
    !location.contains("://") && location.split('+').count() == 3
}

/// Whether `location` is internal content stored under `pid`'s own space.
pub fn is_owned_location(pid: &Pid, location: &str) -> bool {
    is_internal_location(location) && location.starts_with(&format!("{pid}+"))
}

// ---------------------------------------------------------------------------
// DatastreamVersion
// ---------------------------------------------------------------------------

/// Where a version's bytes live.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum VersionContent {
    /// Canonical XML held in the object record.
    Inline(String),
    /// A URL or an internal location of managed content.
    Location(String),
}

impl VersionContent {
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Location(loc) => Some(loc),
            Self::Inline(_) => None,
        }
    }
}

/// One immutable snapshot of a datastream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatastreamVersion {
    /// `{datastreamId}.{n}`
    pub version_id: String,
    pub label: String,
    pub mime_type: String,
    pub format_uri: Option<String>,
    #[serde(default)]
    pub alt_ids: Vec<String>,
    pub content: VersionContent,
    pub checksum_type: String,
    pub checksum: Option<String>,
    /// Content size in bytes, when known.
    pub size: Option<u64>,
    /// Authoritative ordering key within the datastream.
    pub created: Timestamp,
}

// ---------------------------------------------------------------------------
// Datastream
// ---------------------------------------------------------------------------

/// A named content stream with an append-only list of versions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datastream {
    pub id: DatastreamId,
    pub control_group: ControlGroup,
    pub versionable: bool,
    pub state: DatastreamState,
    /// Suffix the next accepted version will get.
    #[serde(default)]
    next_version: u32,
    /// Sorted by creation date, oldest first.
    versions: Vec<DatastreamVersion>,
}

impl Datastream {
    pub fn new(
        id: DatastreamId,
        control_group: ControlGroup,
        versionable: bool,
        state: DatastreamState,
    ) -> Self {
        Self {
            id,
            control_group,
            versionable,
            state,
            next_version: 0,
            versions: Vec::new(),
        }
    }

    /// Id the next appended version must carry.
    pub fn next_version_id(&self) -> String {
        self.id.version_id(self.next_version)
    }

    /// Whether the version counter has run out of ids.
    pub fn versions_exhausted(&self) -> bool {
        self.next_version == u32::MAX
    }

    /// Append a version. Its id must be [`Datastream::next_version_id`] and
    /// its creation date must be after every existing version.
    pub fn push_version(&mut self, version: DatastreamVersion) -> &DatastreamVersion {
        debug_assert_eq!(version.version_id, self.next_version_id());
        debug_assert!(self.current().map_or(true, |c| c.created < version.created));
        self.next_version = self.next_version.saturating_add(1);
        self.versions.push(version);
        &self.versions[self.versions.len() - 1]
    }

    /// The version with the latest creation date.
    pub fn current(&self) -> Option<&DatastreamVersion> {
        self.versions.last()
    }

    /// The version that was current at `as_of`, or the current version when
    /// no date is given.
    pub fn version_at(&self, as_of: Option<&Timestamp>) -> Option<&DatastreamVersion> {
        match as_of {
            None => self.current(),
            Some(date) => self.versions.iter().rev().find(|v| v.created <= *date),
        }
    }

    /// Versions oldest first.
    pub fn versions(&self) -> &[DatastreamVersion] {
        &self.versions
    }

    /// Versions newest first.
    pub fn history(&self) -> Vec<&DatastreamVersion> {
        self.versions.iter().rev().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Creation date of the oldest surviving version.
    pub fn created(&self) -> Option<Timestamp> {
        self.versions.first().map(|v| v.created)
    }

    /// Number of versions whose creation date lies in `[start, end]`.
    pub fn count_in_range(&self, start: Option<&Timestamp>, end: Option<&Timestamp>) -> usize {
        self.versions
            .iter()
            .filter(|v| in_range(&v.created, start, end))
            .count()
    }

    /// Remove every version created in `[start, end]` and return them,
    /// oldest first. Open bounds extend to the beginning/end of time.
    pub fn purge_range(
        &mut self,
        start: Option<&Timestamp>,
        end: Option<&Timestamp>,
    ) -> Vec<DatastreamVersion> {
        let (removed, kept) = std::mem::take(&mut self.versions)
            .into_iter()
            .partition(|v| in_range(&v.created, start, end));
        self.versions = kept;
        removed
    }

    /// Restore ordering and the version counter after deserialization.
    pub fn normalize(&mut self) {
        self.versions.sort_by(|a, b| a.created.cmp(&b.created));
        let prefix = format!("{}.", self.id);
        let highest = self
            .versions
            .iter()
            .filter_map(|v| v.version_id.strip_prefix(&prefix)?.parse::<u32>().ok())
            .max();
        if let Some(highest) = highest {
            self.next_version = self.next_version.max(highest.saturating_add(1));
        }
    }
}

fn in_range(date: &Timestamp, start: Option<&Timestamp>, end: Option<&Timestamp>) -> bool {
    start.map_or(true, |s| date >= s) && end.map_or(true, |e| date <= e)
}

// ---------------------------------------------------------------------------
// DigitalObject
// ---------------------------------------------------------------------------

/// A named aggregate of properties, datastreams, audit trail and relationships.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DigitalObject {
    pub pid: Pid,
    pub label: String,
    pub owner_id: String,
    pub state: ObjectState,
    pub created: Timestamp,
    pub last_modified: Timestamp,
    pub audit_trail: AuditTrail,
    pub relationships: RelationshipSet,
    datastreams: BTreeMap<DatastreamId, Datastream>,
}

impl DigitalObject {
    /// A new active object with no datastreams.
    pub fn new(pid: Pid, label: impl Into<String>, owner_id: impl Into<String>, created: Timestamp) -> Self {
        Self {
            pid,
            label: label.into(),
            owner_id: owner_id.into(),
            state: ObjectState::Active,
            created,
            last_modified: created,
            audit_trail: AuditTrail::new(),
            relationships: RelationshipSet::new(),
            datastreams: BTreeMap::new(),
        }
    }

    pub fn datastream(&self, id: &str) -> Option<&Datastream> {
        self.datastreams.get(id)
    }

    pub fn datastream_mut(&mut self, id: &str) -> Option<&mut Datastream> {
        self.datastreams.get_mut(id)
    }

    pub fn has_datastream(&self, id: &str) -> bool {
        self.datastreams.contains_key(id)
    }

    /// Datastreams ordered by id.
    pub fn datastreams(&self) -> impl Iterator<Item = &Datastream> {
        self.datastreams.values()
    }

    /// Insert a datastream, returning any datastream it replaced.
    pub fn insert_datastream(&mut self, datastream: Datastream) -> Option<Datastream> {
        self.datastreams.insert(datastream.id.clone(), datastream)
    }

    pub fn remove_datastream(&mut self, id: &str) -> Option<Datastream> {
        self.datastreams.remove(id)
    }

    /// The smallest unused `DS{n}` id with `n >= 1`.
    pub fn new_datastream_id(&self) -> DatastreamId {
        let mut n = 1u32;
        loop {
            let candidate = format!("DS{n}");
            if !self.datastreams.contains_key(candidate.as_str()) {
                if let Ok(id) = DatastreamId::parse(&candidate) {
                    return id;
                }
            }
            n += 1;
        }
    }

    /// Internal locations stored under this object's own PID. Only these
    /// may be reclaimed when the object drops them.
    pub fn owned_locations(&self) -> BTreeSet<String> {
        self.internal_locations()
            .into_iter()
            .filter(|loc| is_owned_location(&self.pid, loc))
            .collect()
    }

    /// Point every version whose content lives at `from` at `to` instead.
    pub fn relocate_content(&mut self, from: &str, to: &str) {
        let versions = self.datastreams.values_mut().flat_map(|ds| ds.versions.iter_mut());
        for version in versions {
            if version.content.location() == Some(from) {
                version.content = VersionContent::Location(to.to_string());
            }
        }
    }

    /// Every internal managed-content location referenced by any version.
    pub fn internal_locations(&self) -> BTreeSet<String> {
        self.datastreams
            .values()
            .flat_map(|ds| ds.versions.iter())
            .filter_map(|v| v.content.location())
            .filter(|loc| is_internal_location(loc))
            .map(str::to_string)
            .collect()
    }

    /// Sorted, de-duplicated creation dates of every version of every
    /// datastream.
    pub fn change_dates(&self) -> Vec<Timestamp> {
        let dates: BTreeSet<Timestamp> = self
            .datastreams
            .values()
            .flat_map(|ds| ds.versions.iter().map(|v| v.created))
            .collect();
        dates.into_iter().collect()
    }
}
