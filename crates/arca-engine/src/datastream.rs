//! Datastream lifecycle: validation and application of datastream changes
//! against an object held by a storage writer.
//!
//! Every method mutates only the writer's in-memory object and pending
//! content. Nothing is durable until the caller commits the writer, and
//! dropping the writer after an error discards the partial change.

use std::sync::Arc;

use arca_audit::{AuditAction, AuditEntry};
use arca_crypto::{ChecksumError, ChecksumRegistry, DEFAULT_TYPE, DISABLED_TYPE};
use arca_gate::Context;
use arca_staging::{parse_upload_location, UploadStaging};
use arca_store::{
    internal_location, is_internal_location, Datastream, DatastreamVersion, DigitalObject,
    ObjectWriter, StoreResult, VersionContent,
};
use arca_types::{
    validate_label, ControlGroup, DatastreamId, DatastreamState, MonotonicClock, Timestamp,
};
use chrono::SecondsFormat;
use tracing::{debug, info};

use crate::content::{is_upload_location, validate_location, ContentFetcher};
use crate::error::{ManagementError, ManagementResult};
use crate::request::{AddDatastream, ContentSource, ModifyDatastream};
use crate::xml::{canonicalize, is_system_stream, validate_system_stream};

/// Datastream every object keeps; it can never be purged entirely.
pub const WELL_KNOWN_DATASTREAM: &str = "DC";

/// Returned by checksum comparison when the version has checksums disabled.
pub const NO_CHECKSUM: &str = "none";

const DEFAULT_XML_MIME_TYPE: &str = "text/xml";
const DEFAULT_MAX_LABEL_LENGTH: usize = 255;

/// Outcome of an operation that appended a version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionChange {
    pub datastream_id: DatastreamId,
    pub version_id: String,
    pub created: Timestamp,
    /// Upload consumed by the new version, to be deleted after commit.
    pub consumed_upload: Option<u64>,
}

/// Content accepted for a new version.
struct Accepted {
    content: VersionContent,
    /// Bytes, when they were already resolved.
    bytes: Option<Vec<u8>>,
    consumed_upload: Option<u64>,
}

impl Accepted {
    fn unchanged(previous: &DatastreamVersion) -> Self {
        Self {
            content: previous.content.clone(),
            bytes: None,
            consumed_upload: None,
        }
    }
}

pub struct DatastreamLifecycle {
    checksums: ChecksumRegistry,
    clock: Arc<MonotonicClock>,
    fetcher: Arc<dyn ContentFetcher>,
    staging: Option<Arc<UploadStaging>>,
    auto_checksum: bool,
    max_label_length: usize,
}

impl DatastreamLifecycle {
    pub fn new(
        checksums: ChecksumRegistry,
        clock: Arc<MonotonicClock>,
        fetcher: Arc<dyn ContentFetcher>,
    ) -> Self {
        Self {
            checksums,
            clock,
            fetcher,
            staging: None,
            auto_checksum: false,
            max_label_length: DEFAULT_MAX_LABEL_LENGTH,
        }
    }

    /// Accept `uploaded://N` locations from `staging`.
    pub fn with_staging(mut self, staging: Arc<UploadStaging>) -> Self {
        self.staging = Some(staging);
        self
    }

    /// Checksum new datastreams with the default type when the caller names
    /// no type.
    pub fn with_auto_checksum(mut self, auto_checksum: bool) -> Self {
        self.auto_checksum = auto_checksum;
        self
    }

    pub fn with_max_label_length(mut self, max_label_length: usize) -> Self {
        self.max_label_length = max_label_length;
        self
    }

    pub fn checksums(&self) -> &ChecksumRegistry {
        &self.checksums
    }

    pub fn staging(&self) -> Option<&Arc<UploadStaging>> {
        self.staging.as_ref()
    }

    // ---- Mutations ----

    /// Add a datastream with its first version `.0`.
    pub fn add(
        &self,
        context: &Context,
        writer: &mut dyn ObjectWriter,
        request: &AddDatastream,
    ) -> ManagementResult<VersionChange> {
        let id = match &request.id {
            Some(id) => {
                let id = DatastreamId::parse(id)?;
                if id.is_reserved() {
                    return Err(ManagementError::validation(format!(
                        "datastream id {id} is reserved"
                    )));
                }
                if writer.object().has_datastream(id.as_str()) {
                    return Err(ManagementError::validation(format!(
                        "datastream {id} already exists in {}",
                        writer.pid()
                    )));
                }
                id
            }
            None => writer.object().new_datastream_id(),
        };
        validate_label(&request.label, self.max_label_length)?;
        if is_system_stream(id.as_str()) && request.control_group != ControlGroup::InlineXml {
            return Err(ManagementError::validation(format!(
                "{id} must be an inline XML datastream"
            )));
        }

        let mut datastream = Datastream::new(
            id.clone(),
            request.control_group,
            request.versionable,
            request.state,
        );
        let version_id = datastream.next_version_id();
        let mut accepted = self.accept(
            writer,
            &id,
            request.control_group,
            &version_id,
            &request.source,
        )?;

        let requested_type = match &request.checksum_type {
            Some(checksum_type) => checksum_type.as_str(),
            None if self.auto_checksum => DEFAULT_TYPE,
            None => DISABLED_TYPE,
        };
        let (checksum_type, checksum) = self.checksum(
            context,
            &*writer,
            requested_type,
            request.checksum.as_deref(),
            &mut accepted,
        )?;

        let mime_type = if request.mime_type.is_empty() && request.control_group.is_by_value() {
            DEFAULT_XML_MIME_TYPE.to_string()
        } else {
            request.mime_type.clone()
        };
        let size = accepted.bytes.as_ref().map(|bytes| bytes.len() as u64);
        let created = self.clock.now();
        datastream.push_version(DatastreamVersion {
            version_id: version_id.clone(),
            label: request.label.clone(),
            mime_type,
            format_uri: request.format_uri.clone().filter(|uri| !uri.is_empty()),
            alt_ids: request.alt_ids.clone(),
            content: accepted.content,
            checksum_type,
            checksum,
            size,
            created,
        });

        let object = writer.object_mut();
        object.insert_datastream(datastream);
        object.last_modified = created;
        object.audit_trail.append(
            AuditEntry::new(
                AuditAction::AddDatastream,
                &context.subject,
                created,
                &request.log_message,
            )
            .with_component(id.as_str()),
        )?;

        info!(pid = %object.pid, datastream = %id, version = %version_id, "datastream added");
        Ok(VersionChange {
            datastream_id: id,
            version_id,
            created,
            consumed_upload: accepted.consumed_upload,
        })
    }

    /// Append a version to an existing datastream.
    ///
    /// `by_value` selects `modifyDatastreamByValue`, which only inline XML
    /// datastreams accept; every other control group is modified by
    /// reference.
    pub fn modify(
        &self,
        context: &Context,
        writer: &mut dyn ObjectWriter,
        request: &ModifyDatastream,
        by_value: bool,
    ) -> ManagementResult<VersionChange> {
        let (action, method) = if by_value {
            (AuditAction::ModifyDatastreamByValue, "modifyDatastreamByValue")
        } else {
            (AuditAction::ModifyDatastreamByReference, "modifyDatastreamByReference")
        };
        let pid = writer.pid().clone();
        let datastream = writer
            .object()
            .datastream(&request.id)
            .ok_or_else(|| ManagementError::not_found(format!("datastream {} in {pid}", request.id)))?;

        let control_group = datastream.control_group;
        if control_group.is_by_value() != by_value {
            return Err(ManagementError::validation(format!(
                "{method} is not valid for {} (control group {})",
                datastream.id,
                control_group.code()
            )));
        }
        if datastream.state == DatastreamState::Deleted {
            return Err(ManagementError::state(format!(
                "datastream {} of {pid} is deleted",
                datastream.id
            )));
        }
        let previous = datastream.current().cloned().ok_or_else(|| {
            ManagementError::not_found(format!("datastream {} of {pid} has no versions", request.id))
        })?;
        if datastream.versions_exhausted() {
            return Err(ManagementError::validation(format!(
                "datastream {} of {pid} has no version ids left",
                datastream.id
            )));
        }
        let id = datastream.id.clone();
        let version_id = datastream.next_version_id();

        let mut accepted = if by_value {
            if request.location.is_some() {
                return Err(ManagementError::validation(format!(
                    "{method} takes content, not a location"
                )));
            }
            match &request.content {
                Some(xml) => self.accept_xml(&id, xml)?,
                None => Accepted::unchanged(&previous),
            }
        } else {
            if request.content.is_some() {
                return Err(ManagementError::validation(format!(
                    "{method} takes a location, not inline content"
                )));
            }
            match request.location.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
                Some(location) => {
                    self.accept_location(writer, &id, control_group, &version_id, location)?
                }
                None if control_group == ControlGroup::ManagedContent => {
                    self.copy_previous(context, writer, &id, &version_id, &previous)?
                }
                None => Accepted::unchanged(&previous),
            }
        };

        let label = request.label.clone().unwrap_or_else(|| previous.label.clone());
        validate_label(&label, self.max_label_length)?;
        let format_uri = match &request.format_uri {
            None => previous.format_uri.clone(),
            Some(uri) if uri.is_empty() => None,
            Some(uri) => Some(uri.clone()),
        };
        let requested_type = request
            .checksum_type
            .as_deref()
            .unwrap_or(&previous.checksum_type);
        let (checksum_type, checksum) = self.checksum(
            context,
            &*writer,
            requested_type,
            request.checksum.as_deref(),
            &mut accepted,
        )?;
        let size = match &accepted.bytes {
            Some(bytes) => Some(bytes.len() as u64),
            None if accepted.content == previous.content => previous.size,
            None => None,
        };

        let created = self.clock.now();
        let version = DatastreamVersion {
            version_id: version_id.clone(),
            label,
            mime_type: request.mime_type.clone().unwrap_or(previous.mime_type),
            format_uri,
            alt_ids: request.alt_ids.clone().unwrap_or(previous.alt_ids),
            content: accepted.content,
            checksum_type,
            checksum,
            size,
            created,
        };

        let object = writer.object_mut();
        object
            .datastream_mut(id.as_str())
            .ok_or_else(|| ManagementError::not_found(format!("datastream {id} in {pid}")))?
            .push_version(version);
        object.last_modified = created;
        object.audit_trail.append(
            AuditEntry::new(action, &context.subject, created, &request.log_message)
                .with_component(id.as_str()),
        )?;

        info!(%pid, datastream = %id, version = %version_id, method, "datastream modified");
        Ok(VersionChange {
            datastream_id: id,
            version_id,
            created,
            consumed_upload: accepted.consumed_upload,
        })
    }

    /// Remove every version created in `[start, end]`, returning their
    /// creation dates oldest first.
    ///
    /// Nothing changes, and no audit record is written, when no version
    /// falls in the range. A datastream whose last version is purged is
    /// removed from the object.
    #[allow(clippy::too_many_arguments)]
    pub fn purge(
        &self,
        context: &Context,
        writer: &mut dyn ObjectWriter,
        id: &str,
        start: Option<&Timestamp>,
        end: Option<&Timestamp>,
        force: bool,
        log_message: &str,
    ) -> ManagementResult<Vec<Timestamp>> {
        if force {
            return Err(ManagementError::Unsupported("forced datastream purge".into()));
        }
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(ManagementError::validation(format!(
                    "purge range starts at {start}, after its end {end}"
                )));
            }
        }

        let pid = writer.pid().clone();
        let datastream = writer
            .object()
            .datastream(id)
            .ok_or_else(|| ManagementError::not_found(format!("datastream {id} in {pid}")))?;
        let matching = datastream.count_in_range(start, end);
        if matching == 0 {
            debug!(%pid, datastream = id, "no versions in purge range");
            return Ok(Vec::new());
        }
        if matching == datastream.versions().len() && id == WELL_KNOWN_DATASTREAM {
            return Err(ManagementError::state(format!(
                "{id} is required by {pid} and cannot be purged entirely"
            )));
        }

        let object = writer.object_mut();
        let datastream = object
            .datastream_mut(id)
            .ok_or_else(|| ManagementError::not_found(format!("datastream {id} in {pid}")))?;
        let removed: Vec<Timestamp> = datastream
            .purge_range(start, end)
            .into_iter()
            .map(|version| version.created)
            .collect();
        if datastream.is_empty() {
            object.remove_datastream(id);
        }

        let dates: Vec<String> = removed
            .iter()
            .map(|date| date.to_rfc3339_opts(SecondsFormat::Millis, true))
            .collect();
        let justification = if log_message.is_empty() {
            format!("purged versions {}", dates.join(", "))
        } else {
            format!("{log_message} (purged versions {})", dates.join(", "))
        };
        let now = self.clock.now();
        object.last_modified = now;
        object.audit_trail.append(
            AuditEntry::new(AuditAction::PurgeDatastream, &context.subject, now, justification)
                .with_component(id),
        )?;

        info!(%pid, datastream = id, purged = removed.len(), "datastream versions purged");
        Ok(removed)
    }

    pub fn set_state(
        &self,
        context: &Context,
        writer: &mut dyn ObjectWriter,
        id: &str,
        state: DatastreamState,
        log_message: &str,
    ) -> ManagementResult<Timestamp> {
        let now = self.clock.now();
        let pid = writer.pid().clone();
        let object = writer.object_mut();
        object
            .datastream_mut(id)
            .ok_or_else(|| ManagementError::not_found(format!("datastream {id} in {pid}")))?
            .state = state;
        object.last_modified = now;
        object.audit_trail.append(
            AuditEntry::new(AuditAction::SetDatastreamState, &context.subject, now, log_message)
                .with_component(id),
        )?;
        info!(%pid, datastream = id, %state, "datastream state set");
        Ok(now)
    }

    /// Record whether new versions are wanted. Modification always appends
    /// a version; the flag is kept for clients that honour it.
    pub fn set_versionable(
        &self,
        context: &Context,
        writer: &mut dyn ObjectWriter,
        id: &str,
        versionable: bool,
        log_message: &str,
    ) -> ManagementResult<Timestamp> {
        let now = self.clock.now();
        let pid = writer.pid().clone();
        let object = writer.object_mut();
        object
            .datastream_mut(id)
            .ok_or_else(|| ManagementError::not_found(format!("datastream {id} in {pid}")))?
            .versionable = versionable;
        object.last_modified = now;
        object.audit_trail.append(
            AuditEntry::new(
                AuditAction::SetDatastreamVersionable,
                &context.subject,
                now,
                log_message,
            )
            .with_component(id),
        )?;
        info!(%pid, datastream = id, versionable, "datastream versionable set");
        Ok(now)
    }

    // ---- Reads ----

    /// Recompute the checksum of the version current at `as_of` and compare
    /// it with the stored value. Returns [`NO_CHECKSUM`] when the version
    /// has checksums disabled.
    pub fn compare_checksum(
        &self,
        context: &Context,
        object: &DigitalObject,
        id: &str,
        as_of: Option<&Timestamp>,
        read_internal: impl Fn(&str) -> StoreResult<Vec<u8>>,
    ) -> ManagementResult<String> {
        let version = self.version_at(object, id, as_of)?;
        if version.checksum_type == DISABLED_TYPE {
            return Ok(NO_CHECKSUM.to_string());
        }
        let bytes = self.version_bytes(context, &version.content, read_internal)?;
        let checksum = match &version.checksum {
            Some(expected) => self.checksums.verify(&version.checksum_type, expected, &bytes)?,
            None => self
                .checksums
                .compute(&version.checksum_type, &bytes)?
                .ok_or_else(|| ChecksumError::UnknownType(version.checksum_type.clone()))?,
        };
        Ok(checksum)
    }

    /// The version of datastream `id` current at `as_of`, latest when absent.
    pub fn version_at<'a>(
        &self,
        object: &'a DigitalObject,
        id: &str,
        as_of: Option<&Timestamp>,
    ) -> ManagementResult<&'a DatastreamVersion> {
        let datastream = object.datastream(id).ok_or_else(|| {
            ManagementError::not_found(format!("datastream {id} in {}", object.pid))
        })?;
        datastream.version_at(as_of).ok_or_else(|| match as_of {
            Some(date) => ManagementError::not_found(format!(
                "no version of {id} in {} at {date}",
                object.pid
            )),
            None => ManagementError::not_found(format!("datastream {id} in {}", object.pid)),
        })
    }

    /// Resolve a version's bytes: inline XML directly, internal locations
    /// through `read_internal`, everything else through the fetcher.
    pub fn version_bytes(
        &self,
        context: &Context,
        content: &VersionContent,
        read_internal: impl Fn(&str) -> StoreResult<Vec<u8>>,
    ) -> ManagementResult<Vec<u8>> {
        match content {
            VersionContent::Inline(xml) => Ok(xml.as_bytes().to_vec()),
            VersionContent::Location(location) if is_internal_location(location) => {
                Ok(read_internal(location)?)
            }
            VersionContent::Location(location) => Ok(self.fetcher.fetch(location, context)?.bytes),
        }
    }

    // ---- Content acceptance ----

    fn accept(
        &self,
        writer: &mut dyn ObjectWriter,
        id: &DatastreamId,
        control_group: ControlGroup,
        version_id: &str,
        source: &ContentSource,
    ) -> ManagementResult<Accepted> {
        match (control_group, source) {
            (ControlGroup::InlineXml, ContentSource::Inline(xml)) => self.accept_xml(id, xml),
            (ControlGroup::InlineXml, ContentSource::Location(_)) => Err(
                ManagementError::validation("inline XML datastreams take content, not a location"),
            ),
            (_, ContentSource::Inline(_)) => Err(ManagementError::validation(format!(
                "control group {} takes a location, not inline content",
                control_group.code()
            ))),
            (_, ContentSource::Location(location)) => {
                self.accept_location(writer, id, control_group, version_id, location.trim())
            }
        }
    }

    fn accept_xml(&self, id: &DatastreamId, xml: &[u8]) -> ManagementResult<Accepted> {
        let canonical = canonicalize(xml)?;
        validate_system_stream(id.as_str(), &canonical)?;
        let bytes = canonical.text.as_bytes().to_vec();
        Ok(Accepted {
            content: VersionContent::Inline(canonical.text),
            bytes: Some(bytes),
            consumed_upload: None,
        })
    }

    /// Check a location and, for managed content supplied as an upload or an
    /// internal location, place the bytes under the new version's own
    /// internal location.
    fn accept_location(
        &self,
        writer: &mut dyn ObjectWriter,
        id: &DatastreamId,
        control_group: ControlGroup,
        version_id: &str,
        location: &str,
    ) -> ManagementResult<Accepted> {
        validate_location(control_group, location)?;
        let remote = Accepted {
            content: VersionContent::Location(location.to_string()),
            bytes: None,
            consumed_upload: None,
        };
        if control_group != ControlGroup::ManagedContent {
            return Ok(remote);
        }

        let (bytes, consumed_upload) = if is_upload_location(location) {
            let staging = self
                .staging
                .as_ref()
                .ok_or_else(|| ManagementError::validation("uploads are not enabled"))?;
            (staging.get_location(location)?, parse_upload_location(location)?)
        } else if is_internal_location(location) {
            (writer.read_content(location)?, None)
        } else {
            return Ok(remote);
        };

        let stored_at = internal_location(writer.pid(), id, version_id);
        writer.put_content(&stored_at, bytes.clone())?;
        debug!(pid = %writer.pid(), from = location, to = %stored_at, "managed content staged");
        Ok(Accepted {
            content: VersionContent::Location(stored_at),
            bytes: Some(bytes),
            consumed_upload,
        })
    }

    /// Copy the previous version's bytes to the new version's internal
    /// location so both stay independently addressable.
    fn copy_previous(
        &self,
        context: &Context,
        writer: &mut dyn ObjectWriter,
        id: &DatastreamId,
        version_id: &str,
        previous: &DatastreamVersion,
    ) -> ManagementResult<Accepted> {
        let bytes = self.version_bytes(context, &previous.content, |location| {
            writer.read_content(location)
        })?;
        let stored_at = internal_location(writer.pid(), id, version_id);
        writer.put_content(&stored_at, bytes.clone())?;
        debug!(
            pid = %writer.pid(),
            from = %previous.version_id,
            to = %stored_at,
            "managed content copied on commit"
        );
        Ok(Accepted {
            content: VersionContent::Location(stored_at),
            bytes: Some(bytes),
            consumed_upload: None,
        })
    }

    /// Resolve the checksum type and compute, or verify, the checksum of the
    /// accepted content. Remote content is fetched only when a checksum is
    /// needed.
    fn checksum(
        &self,
        context: &Context,
        writer: &dyn ObjectWriter,
        requested_type: &str,
        expected: Option<&str>,
        accepted: &mut Accepted,
    ) -> ManagementResult<(String, Option<String>)> {
        let checksum_type = self.checksums.resolve(requested_type)?;
        if checksum_type == DISABLED_TYPE {
            if expected.is_some() {
                return Err(ChecksumError::ValueWithoutType.into());
            }
            return Ok((checksum_type, None));
        }

        let bytes = match accepted.bytes.take() {
            Some(bytes) => bytes,
            None => self.version_bytes(context, &accepted.content, |location| {
                writer.read_content(location)
            })?,
        };
        let checksum = match expected {
            Some(expected) => self.checksums.verify(&checksum_type, expected, &bytes)?,
            None => self
                .checksums
                .compute(&checksum_type, &bytes)?
                .ok_or_else(|| ChecksumError::UnknownType(checksum_type.clone()))?,
        };
        accepted.bytes = Some(bytes);
        Ok((checksum_type, Some(checksum)))
    }
}

impl std::fmt::Debug for DatastreamLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatastreamLifecycle")
            .field("checksum_types", &self.checksums.names())
            .field("default_checksum_type", &self.checksums.default_type())
            .field("auto_checksum", &self.auto_checksum)
            .field("staging", &self.staging.is_some())
            .field("max_label_length", &self.max_label_length)
            .finish()
    }
}
