use std::sync::Arc;

use arca_audit::{AuditAction, AuditEntry};
use arca_gate::Context;
use arca_pid::PidGenerator;
use arca_rels::{RelObject, RelationshipStore, RelationshipTuple, TriplePattern};
use arca_staging::UPLOAD_SCHEME;
use arca_store::{
    internal_location, is_internal_location, is_owned_location, DatastreamVersion, DigitalObject,
    ObjectStorage, ObjectWriter, StoreError, VersionContent,
};
use arca_types::{
    validate_label, DatastreamId, DatastreamState, MonotonicClock, Pid, Timestamp,
    PID_URI_PREFIX,
};
use tracing::{info, warn};

use crate::datastream::DatastreamLifecycle;
use crate::error::{ManagementError, ManagementResult};
use crate::management::Management;
use crate::request::{
    AddDatastream, DatastreamContent, DatastreamProfile, IngestRequest, ModifyDatastream,
    ModifyObject, ObjectProfile,
};
use crate::xml::{canonicalize, is_system_stream, render_object, validate_system_stream};

const DEFAULT_MAX_LABEL_LENGTH: usize = 255;

/// Normalize a relationship subject to its `info:arca/` URI and derive the
/// PID of the object that owns it.
pub fn resolve_subject(subject: &str) -> ManagementResult<(Pid, String)> {
    let subject = subject.trim();
    let pid = Pid::from_uri_or_pid(subject)?;
    let uri = if subject.starts_with(PID_URI_PREFIX) {
        subject.to_string()
    } else {
        format!("{PID_URI_PREFIX}{subject}")
    };
    Ok((pid, uri))
}

/// Object lifecycle: the concrete [`Management`] implementation.
///
/// Holds no per-object state. Every mutation acquires a writer from
/// storage, applies the change and its audit record to the writer's copy,
/// and commits. An error before the commit drops the writer, which discards
/// everything done through it.
pub struct ObjectLifecycle {
    storage: Arc<dyn ObjectStorage>,
    pids: Arc<PidGenerator>,
    datastreams: DatastreamLifecycle,
    clock: Arc<MonotonicClock>,
    pid_namespace: String,
    max_label_length: usize,
}

impl ObjectLifecycle {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        pids: Arc<PidGenerator>,
        datastreams: DatastreamLifecycle,
        clock: Arc<MonotonicClock>,
        pid_namespace: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            pids,
            datastreams,
            clock,
            pid_namespace: pid_namespace.into(),
            max_label_length: DEFAULT_MAX_LABEL_LENGTH,
        }
    }

    pub fn with_max_label_length(mut self, max_label_length: usize) -> Self {
        self.max_label_length = max_label_length;
        self
    }

    pub fn storage(&self) -> &Arc<dyn ObjectStorage> {
        &self.storage
    }

    pub fn pids(&self) -> &PidGenerator {
        &self.pids
    }

    pub fn datastreams(&self) -> &DatastreamLifecycle {
        &self.datastreams
    }

    /// Acquire a writer, apply `change` and commit. The writer is released
    /// when it goes out of scope, on every path.
    fn write<T>(
        &self,
        pid: &Pid,
        log_message: &str,
        change: impl FnOnce(&mut dyn ObjectWriter) -> ManagementResult<T>,
    ) -> ManagementResult<T> {
        let mut writer = self.storage.writer(pid)?;
        let value = change(&mut *writer)?;
        writer.commit(log_message)?;
        Ok(value)
    }

    /// Delete an upload consumed by a committed version. Failure only
    /// leaves the file for the expiry sweep.
    fn release_upload(&self, handle: Option<u64>) {
        let (Some(handle), Some(staging)) = (handle, self.datastreams.staging()) else {
            return;
        };
        if let Err(e) = staging.remove(handle) {
            warn!(handle, error = %e, "consumed upload not deleted");
        }
    }

    /// Reject serializations that could not have been produced through the
    /// management operations.
    fn check_ingested(&self, object: &DigitalObject) -> ManagementResult<()> {
        validate_label(&object.label, self.max_label_length)?;
        for datastream in object.datastreams() {
            if datastream.id.is_reserved() {
                return Err(ManagementError::validation(format!(
                    "datastream id {} is reserved",
                    datastream.id
                )));
            }
            if datastream.is_empty() {
                return Err(ManagementError::validation(format!(
                    "datastream {} has no versions",
                    datastream.id
                )));
            }
            if datastream.versions_exhausted() {
                return Err(ManagementError::validation(format!(
                    "datastream {} has no version ids left",
                    datastream.id
                )));
            }
            let prefix = format!("{}.", datastream.id);
            for version in datastream.versions() {
                let numeric = version
                    .version_id
                    .strip_prefix(&prefix)
                    .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()));
                if numeric.is_some_and(|n| n.parse::<u32>().is_err()) {
                    return Err(ManagementError::validation(format!(
                        "version id {} is out of range",
                        version.version_id
                    )));
                }
            }
            if !is_system_stream(datastream.id.as_str()) {
                continue;
            }
            match datastream.current().map(|v| &v.content) {
                Some(VersionContent::Inline(xml)) => {
                    let canonical = canonicalize(xml.as_bytes())?;
                    validate_system_stream(datastream.id.as_str(), &canonical)?;
                }
                _ => {
                    return Err(ManagementError::validation(format!(
                        "{} must be an inline XML datastream",
                        datastream.id
                    )))
                }
            }
        }
        Ok(())
    }

    /// Copy managed content an ingested object references under another
    /// PID into its own space, so each object only ever owns its own bytes.
    /// Returns the copies to stage on the ingest writer.
    fn adopt_content(
        &self,
        object: &mut DigitalObject,
    ) -> ManagementResult<Vec<(String, Vec<u8>)>> {
        let mut foreign: Vec<(String, String)> = Vec::new();
        for datastream in object.datastreams() {
            for version in datastream.versions() {
                let Some(location) = version.content.location() else {
                    continue;
                };
                if !is_internal_location(location)
                    || is_owned_location(&object.pid, location)
                    || foreign.iter().any(|(from, _)| from == location)
                {
                    continue;
                }
                let own = internal_location(&object.pid, &datastream.id, &version.version_id);
                foreign.push((location.to_string(), own));
            }
        }

        let mut copies = Vec::with_capacity(foreign.len());
        for (from, to) in foreign {
            let bytes = match self.storage.read_content(&from) {
                Ok(bytes) => bytes,
                Err(StoreError::NotFound(_) | StoreError::ContentNotFound(_)) => {
                    return Err(ManagementError::validation(format!(
                        "managed content at {from} does not exist"
                    )))
                }
                Err(e) => return Err(e.into()),
            };
            object.relocate_content(&from, &to);
            copies.push((to, bytes));
        }
        Ok(copies)
    }

    /// Keep the clock ahead of every date an ingested object carries.
    fn observe_dates(&self, object: &DigitalObject) {
        self.clock.observe(&object.created);
        self.clock.observe(&object.last_modified);
        if let Some(latest) = object.change_dates().last() {
            self.clock.observe(latest);
        }
        if let Some(record) = object.audit_trail.last() {
            self.clock.observe(&record.date);
        }
    }

    fn profile(datastream: &arca_store::Datastream, version: &DatastreamVersion) -> DatastreamProfile {
        DatastreamProfile {
            id: datastream.id.clone(),
            control_group: datastream.control_group,
            state: datastream.state,
            versionable: datastream.versionable,
            version: version.clone(),
        }
    }

    fn change_relationship(
        &self,
        context: &Context,
        action: AuditAction,
        tuple: RelationshipTuple,
        pid: &Pid,
    ) -> ManagementResult<bool> {
        let mut writer = self.storage.writer(pid)?;
        let object = writer.object_mut();
        let changed = match action {
            AuditAction::AddRelationship => object.relationships.add(tuple.clone()),
            _ => object.relationships.purge(&tuple),
        };
        if !changed {
            return Ok(false);
        }

        let now = self.clock.now();
        let justification = format!("{} {} {}", tuple.subject, tuple.predicate, tuple.object);
        object.last_modified = now;
        object
            .audit_trail
            .append(AuditEntry::new(action, &context.subject, now, justification))?;
        writer.commit(action.as_str())?;
        info!(%pid, %action, predicate = %tuple.predicate, "relationship changed");
        Ok(true)
    }
}

impl Management for ObjectLifecycle {
    // ---- Objects ----

    fn ingest(&self, context: &Context, request: &IngestRequest) -> ManagementResult<Pid> {
        let record = self
            .storage
            .decode(&request.serialization, &request.format, &request.encoding)?;
        let pid = match (&record.pid, request.new_pid) {
            (Some(pid), false) => {
                self.pids.reserve(pid)?;
                pid.clone()
            }
            _ => self.pids.generate(&self.pid_namespace)?,
        };
        if self.storage.object_exists(&pid)? {
            return Err(ManagementError::validation(format!("object {pid} already exists")));
        }

        let mut object = record.into_object(pid.clone(), self.clock.now());
        self.check_ingested(&object)?;
        if object.owner_id.is_empty() {
            object.owner_id = context.subject.clone();
        }
        self.observe_dates(&object);

        if let Some(message) = &request.log_message {
            let now = self.clock.now();
            object.last_modified = now;
            object
                .audit_trail
                .append(AuditEntry::new(AuditAction::Ingest, &context.subject, now, message))?;
        }

        let adopted = self.adopt_content(&mut object)?;

        let mut writer = self.storage.ingest_writer(object)?;
        for (location, bytes) in adopted {
            writer.put_content(&location, bytes)?;
        }
        writer.commit(request.log_message.as_deref().unwrap_or_default())?;
        info!(%pid, subject = %context.subject, "object ingested");
        Ok(pid)
    }

    fn modify_object(
        &self,
        context: &Context,
        pid: &Pid,
        request: &ModifyObject,
    ) -> ManagementResult<Timestamp> {
        if let Some(label) = &request.label {
            validate_label(label, self.max_label_length)?;
        }
        self.write(pid, &request.log_message, |writer| {
            let now = self.clock.now();
            let object = writer.object_mut();
            if let Some(state) = request.state {
                object.state = state;
            }
            if let Some(label) = &request.label {
                object.label = label.clone();
            }
            if let Some(owner_id) = &request.owner_id {
                object.owner_id = owner_id.clone();
            }
            object.last_modified = now;
            object.audit_trail.append(AuditEntry::new(
                AuditAction::ModifyObject,
                &context.subject,
                now,
                &request.log_message,
            ))?;
            info!(%pid, "object modified");
            Ok(now)
        })
    }

    fn purge_object(
        &self,
        context: &Context,
        pid: &Pid,
        log_message: &str,
        force: bool,
    ) -> ManagementResult<Timestamp> {
        if force {
            return Err(ManagementError::Unsupported("forced object purge".into()));
        }
        self.write(pid, log_message, |writer| {
            let now = self.clock.now();
            writer.object_mut().audit_trail.append(AuditEntry::new(
                AuditAction::PurgeObject,
                &context.subject,
                now,
                log_message,
            ))?;
            writer.remove();
            info!(%pid, "object purged");
            Ok(now)
        })
    }

    fn export(
        &self,
        _context: &Context,
        pid: &Pid,
        format: &str,
        encoding: &str,
    ) -> ManagementResult<Vec<u8>> {
        let object = self.storage.reader(pid)?;
        Ok(self.storage.encode(&object, format, encoding)?)
    }

    fn get_object_xml(&self, _context: &Context, pid: &Pid) -> ManagementResult<String> {
        let object = self.storage.reader(pid)?;
        Ok(render_object(&object))
    }

    fn get_object_profile(&self, _context: &Context, pid: &Pid) -> ManagementResult<ObjectProfile> {
        let object = self.storage.reader(pid)?;
        Ok(ObjectProfile {
            pid: object.pid.clone(),
            label: object.label.clone(),
            owner_id: object.owner_id.clone(),
            state: object.state,
            created: object.created,
            last_modified: object.last_modified,
            datastream_ids: object.datastreams().map(|ds| ds.id.clone()).collect(),
        })
    }

    fn get_object_history(&self, _context: &Context, pid: &Pid) -> ManagementResult<Vec<Timestamp>> {
        Ok(self.storage.reader(pid)?.change_dates())
    }

    // ---- Datastreams ----

    fn add_datastream(
        &self,
        context: &Context,
        pid: &Pid,
        request: &AddDatastream,
    ) -> ManagementResult<DatastreamId> {
        let change = self.write(pid, &request.log_message, |writer| {
            self.datastreams.add(context, writer, request)
        })?;
        self.release_upload(change.consumed_upload);
        Ok(change.datastream_id)
    }

    fn modify_datastream_by_value(
        &self,
        context: &Context,
        pid: &Pid,
        request: &ModifyDatastream,
    ) -> ManagementResult<Timestamp> {
        let change = self.write(pid, &request.log_message, |writer| {
            self.datastreams.modify(context, writer, request, true)
        })?;
        Ok(change.created)
    }

    fn modify_datastream_by_reference(
        &self,
        context: &Context,
        pid: &Pid,
        request: &ModifyDatastream,
    ) -> ManagementResult<Timestamp> {
        let change = self.write(pid, &request.log_message, |writer| {
            self.datastreams.modify(context, writer, request, false)
        })?;
        self.release_upload(change.consumed_upload);
        Ok(change.created)
    }

    fn purge_datastream(
        &self,
        context: &Context,
        pid: &Pid,
        datastream_id: &str,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
        log_message: &str,
        force: bool,
    ) -> ManagementResult<Vec<Timestamp>> {
        let mut writer = self.storage.writer(pid)?;
        let removed = self.datastreams.purge(
            context,
            &mut *writer,
            datastream_id,
            start.as_ref(),
            end.as_ref(),
            force,
            log_message,
        )?;
        if !removed.is_empty() {
            writer.commit(log_message)?;
        }
        Ok(removed)
    }

    fn set_datastream_state(
        &self,
        context: &Context,
        pid: &Pid,
        datastream_id: &str,
        state: DatastreamState,
        log_message: &str,
    ) -> ManagementResult<Timestamp> {
        self.write(pid, log_message, |writer| {
            self.datastreams
                .set_state(context, writer, datastream_id, state, log_message)
        })
    }

    fn set_datastream_versionable(
        &self,
        context: &Context,
        pid: &Pid,
        datastream_id: &str,
        versionable: bool,
        log_message: &str,
    ) -> ManagementResult<Timestamp> {
        self.write(pid, log_message, |writer| {
            self.datastreams
                .set_versionable(context, writer, datastream_id, versionable, log_message)
        })
    }

    fn compare_datastream_checksum(
        &self,
        context: &Context,
        pid: &Pid,
        datastream_id: &str,
        version_date: Option<Timestamp>,
    ) -> ManagementResult<String> {
        let object = self.storage.reader(pid)?;
        self.datastreams.compare_checksum(
            context,
            &object,
            datastream_id,
            version_date.as_ref(),
            |location| self.storage.read_content(location),
        )
    }

    fn get_datastream(
        &self,
        _context: &Context,
        pid: &Pid,
        datastream_id: &str,
        as_of: Option<Timestamp>,
    ) -> ManagementResult<DatastreamProfile> {
        let object = self.storage.reader(pid)?;
        let version = self.datastreams.version_at(&object, datastream_id, as_of.as_ref())?;
        let datastream = object
            .datastream(datastream_id)
            .ok_or_else(|| ManagementError::not_found(format!("datastream {datastream_id} in {pid}")))?;
        Ok(Self::profile(datastream, version))
    }

    fn get_datastreams(
        &self,
        _context: &Context,
        pid: &Pid,
        as_of: Option<Timestamp>,
        state: Option<DatastreamState>,
    ) -> ManagementResult<Vec<DatastreamProfile>> {
        let object = self.storage.reader(pid)?;
        Ok(object
            .datastreams()
            .filter(|ds| state.map_or(true, |wanted| ds.state == wanted))
            .filter_map(|ds| ds.version_at(as_of.as_ref()).map(|v| Self::profile(ds, v)))
            .collect())
    }

    fn get_datastream_history(
        &self,
        _context: &Context,
        pid: &Pid,
        datastream_id: &str,
    ) -> ManagementResult<Vec<DatastreamVersion>> {
        let object = self.storage.reader(pid)?;
        let datastream = object
            .datastream(datastream_id)
            .ok_or_else(|| ManagementError::not_found(format!("datastream {datastream_id} in {pid}")))?;
        Ok(datastream.history().into_iter().cloned().collect())
    }

    fn get_datastream_content(
        &self,
        context: &Context,
        pid: &Pid,
        datastream_id: &str,
        as_of: Option<Timestamp>,
    ) -> ManagementResult<DatastreamContent> {
        let object = self.storage.reader(pid)?;
        let version = self.datastreams.version_at(&object, datastream_id, as_of.as_ref())?;
        let bytes = self.datastreams.version_bytes(context, &version.content, |location| {
            self.storage.read_content(location)
        })?;
        Ok(DatastreamContent {
            version_id: version.version_id.clone(),
            mime_type: version.mime_type.clone(),
            bytes,
        })
    }

    // ---- Relationships ----

    fn get_relationships(
        &self,
        _context: &Context,
        subject: &str,
        predicate: Option<&str>,
    ) -> ManagementResult<Vec<RelationshipTuple>> {
        let (pid, subject) = resolve_subject(subject)?;
        let object = self.storage.reader(&pid)?;
        let mut pattern = TriplePattern::any().with_subject(subject);
        if let Some(predicate) = predicate {
            pattern = pattern.with_predicate(predicate);
        }
        Ok(object.relationships.query(&pattern))
    }

    fn add_relationship(
        &self,
        context: &Context,
        subject: &str,
        predicate: &str,
        object: &str,
        is_literal: bool,
        datatype: Option<&str>,
    ) -> ManagementResult<bool> {
        let (pid, subject) = resolve_subject(subject)?;
        let object = RelObject::from_parts(object, is_literal, datatype)?;
        let tuple = RelationshipTuple::new(&subject, predicate, object)?;
        self.change_relationship(context, AuditAction::AddRelationship, tuple, &pid)
    }

    fn purge_relationship(
        &self,
        context: &Context,
        subject: &str,
        predicate: &str,
        object: &str,
        is_literal: bool,
        datatype: Option<&str>,
    ) -> ManagementResult<bool> {
        let (pid, subject) = resolve_subject(subject)?;
        let object = RelObject::from_parts(object, is_literal, datatype)?;
        let tuple = RelationshipTuple::new(&subject, predicate, object)?;
        self.change_relationship(context, AuditAction::PurgeRelationship, tuple, &pid)
    }

    // ---- Administration ----

    fn get_next_pid(
        &self,
        _context: &Context,
        count: usize,
        namespace: Option<&str>,
    ) -> ManagementResult<Vec<Pid>> {
        if count == 0 {
            return Err(ManagementError::validation("PID count must be positive"));
        }
        let namespace = namespace.unwrap_or(&self.pid_namespace);
        Ok(self.pids.generate_many(namespace, count)?)
    }

    fn upload(&self, _context: &Context, bytes: &[u8]) -> ManagementResult<String> {
        let staging = self
            .datastreams
            .staging()
            .ok_or_else(|| ManagementError::validation("uploads are not enabled"))?;
        let handle = staging.put(bytes)?;
        Ok(format!("{UPLOAD_SCHEME}{handle}"))
    }
}

impl std::fmt::Debug for ObjectLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectLifecycle")
            .field("pid_namespace", &self.pid_namespace)
            .field("pids", &self.pids)
            .field("datastreams", &self.datastreams)
            .field("max_label_length", &self.max_label_length)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::LocalFileFetcher;
    use arca_crypto::ChecksumRegistry;
    use arca_pid::InMemoryPidTable;
    use arca_store::InMemoryStorage;
    use arca_types::ObjectState;

    fn engine() -> (Arc<InMemoryStorage>, ObjectLifecycle) {
        let storage = Arc::new(InMemoryStorage::new());
        let pids = Arc::new(PidGenerator::new(Arc::new(InMemoryPidTable::new())).unwrap());
        let clock = Arc::new(MonotonicClock::new());
        let datastreams = DatastreamLifecycle::new(
            ChecksumRegistry::with_defaults(),
            clock.clone(),
            Arc::new(LocalFileFetcher),
        );
        let engine = ObjectLifecycle::new(storage.clone(), pids, datastreams, clock, "test");
        (storage, engine)
    }

    fn ctx() -> Context {
        Context::new("alice")
    }

    fn ingest(engine: &ObjectLifecycle, json: &str) -> ManagementResult<Pid> {
        engine.ingest(&ctx(), &IngestRequest::json(json))
    }

    // -----------------------------------------------------------------------
    // Subjects
    // -----------------------------------------------------------------------

    #[test]
    fn subjects_normalize_to_uris() {
        let (pid, uri) = resolve_subject("demo:1").unwrap();
        assert_eq!(pid.to_string(), "demo:1");
        assert_eq!(uri, "info:arca/demo:1");

        let (pid, uri) = resolve_subject("info:arca/demo:1/DS1").unwrap();
        assert_eq!(pid.to_string(), "demo:1");
        assert_eq!(uri, "info:arca/demo:1/DS1");

        assert!(resolve_subject("no separator").is_err());
    }

    // -----------------------------------------------------------------------
    // Ingest
    // -----------------------------------------------------------------------

    #[test]
    fn ingest_keeps_serialized_pid_and_reserves_it() {
        let (_, engine) = engine();
        let pid = ingest(&engine, r#"{"pid": "test:41", "label": "x"}"#).unwrap();
        assert_eq!(pid.to_string(), "test:41");
        let next = engine.get_next_pid(&ctx(), 1, None).unwrap();
        assert_eq!(next[0].to_string(), "test:42");
    }

    #[test]
    fn ingest_generates_pid_when_absent_or_requested() {
        let (_, engine) = engine();
        let a = ingest(&engine, r#"{"label": "x"}"#).unwrap();
        let b = engine
            .ingest(&ctx(), &IngestRequest::json(r#"{"pid": "other:9"}"#).with_new_pid())
            .unwrap();
        assert_eq!(a.to_string(), "test:1");
        assert_eq!(b.to_string(), "test:2");
    }

    #[test]
    fn ingest_audits_only_with_log_message() {
        let (storage, engine) = engine();
        let quiet = ingest(&engine, "{}").unwrap();
        let logged = engine
            .ingest(&ctx(), &IngestRequest::json("{}").with_log_message("initial load"))
            .unwrap();
        assert!(storage.reader(&quiet).unwrap().audit_trail.is_empty());
        let trail = storage.reader(&logged).unwrap().audit_trail;
        assert_eq!(trail.len(), 1);
        assert_eq!(trail.records()[0].action, AuditAction::Ingest);
        assert_eq!(trail.records()[0].responsibility, "alice");
    }

    #[test]
    fn ingest_rejects_duplicates_and_bad_input() {
        let (_, engine) = engine();
        ingest(&engine, r#"{"pid": "test:5"}"#).unwrap();
        assert_eq!(
            ingest(&engine, r#"{"pid": "test:5"}"#).unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(ingest(&engine, "not json").unwrap_err().kind(), ErrorKind::Validation);
        let wrong_format = engine.ingest(
            &ctx(),
            &IngestRequest {
                format: "foxml".into(),
                ..IngestRequest::json("{}")
            },
        );
        assert_eq!(wrong_format.unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn ingest_defaults_owner_to_subject() {
        let (_, engine) = engine();
        let pid = ingest(&engine, "{}").unwrap();
        assert_eq!(engine.get_object_profile(&ctx(), &pid).unwrap().owner_id, "alice");
    }

    // -----------------------------------------------------------------------
    // Object operations
    // -----------------------------------------------------------------------

    #[test]
    fn modify_object_changes_only_supplied_fields() {
        let (_, engine) = engine();
        let pid = ingest(&engine, r#"{"label": "before", "ownerId": "bob"}"#).unwrap();
        engine
            .modify_object(&ctx(), &pid, &ModifyObject::new("retire").with_state(ObjectState::Inactive))
            .unwrap();
        let profile = engine.get_object_profile(&ctx(), &pid).unwrap();
        assert_eq!(profile.state, ObjectState::Inactive);
        assert_eq!(profile.label, "before");
        assert_eq!(profile.owner_id, "bob");

        let long = "x".repeat(300);
        let err = engine
            .modify_object(&ctx(), &pid, &ModifyObject::new("").with_label(long))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn purge_object_leaves_tombstone() {
        let (storage, engine) = engine();
        let pid = ingest(&engine, "{}").unwrap();
        assert_eq!(
            engine.purge_object(&ctx(), &pid, "gone", true).unwrap_err().kind(),
            ErrorKind::Unsupported
        );
        engine.purge_object(&ctx(), &pid, "gone", false).unwrap();
        assert_eq!(
            engine.get_object_profile(&ctx(), &pid).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        let trail = storage.purged_audit_trail(&pid).unwrap().unwrap();
        assert_eq!(trail.last().unwrap().action, AuditAction::PurgeObject);
    }

    #[test]
    fn export_round_trips_through_ingest() {
        let (_, engine) = engine();
        let pid = ingest(&engine, r#"{"label": "exported"}"#).unwrap();
        engine
            .add_datastream(&ctx(), &pid, &AddDatastream::inline("<a/>"))
            .unwrap();
        let bytes = engine
            .export(&ctx(), &pid, arca_store::ARCA_JSON_FORMAT, "UTF-8")
            .unwrap();
        let copy = engine
            .ingest(&ctx(), &IngestRequest::json(bytes).with_new_pid())
            .unwrap();
        let copied = engine.get_datastream(&ctx(), &copy, "DS1", None).unwrap();
        assert_eq!(copied.version.content, VersionContent::Inline("<a/>".into()));
    }

    fn exported_with(
        engine: &ObjectLifecycle,
        edit: impl FnOnce(&mut serde_json::Value),
    ) -> Vec<u8> {
        let pid = ingest(engine, "{}").unwrap();
        engine
            .add_datastream(&ctx(), &pid, &AddDatastream::inline("<a/>").with_id("META"))
            .unwrap();
        let bytes = engine
            .export(&ctx(), &pid, arca_store::ARCA_JSON_FORMAT, "UTF-8")
            .unwrap();
        let mut json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        edit(&mut json);
        serde_json::to_vec(&json).unwrap()
    }

    #[test]
    fn ingest_rejects_exhausted_version_counters() {
        let (_, engine) = engine();
        type Edit = fn(&mut serde_json::Value);
        let cases: [Edit; 3] = [
            |json: &mut serde_json::Value| {
                json["datastreams"][0]["nextVersion"] = serde_json::json!(u32::MAX);
            },
            |json: &mut serde_json::Value| {
                json["datastreams"][0]["versions"][0]["versionId"] = "META.4294967295".into();
            },
            |json: &mut serde_json::Value| {
                json["datastreams"][0]["versions"][0]["versionId"] = "META.4294967296".into();
            },
        ];
        for edit in cases {
            let bytes = exported_with(&engine, edit);
            let err = engine
                .ingest(&ctx(), &IngestRequest::json(bytes).with_new_pid())
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[test]
    fn ingest_rejects_dangling_managed_content() {
        let (storage, engine) = engine();
        let bytes = exported_with(&engine, |json| {
            json["datastreams"][0]["versions"][0]["content"] =
                serde_json::json!({"type": "location", "value": "gone:1+META+META.0"});
        });
        let before = storage.len();
        let err = engine
            .ingest(&ctx(), &IngestRequest::json(bytes).with_new_pid())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(storage.len(), before);
    }

    #[test]
    fn object_xml_names_datastreams() {
        let (_, engine) = engine();
        let pid = ingest(&engine, r#"{"label": "a & b"}"#).unwrap();
        engine
            .add_datastream(&ctx(), &pid, &AddDatastream::inline("<a/>").with_id("META"))
            .unwrap();
        let xml = engine.get_object_xml(&ctx(), &pid).unwrap();
        assert!(xml.contains(r#"label="a &amp; b""#));
        assert!(xml.contains(r#"<datastream id="META""#));
        assert!(xml.contains("<xmlContent><a/></xmlContent>"));
        assert!(canonicalize(xml.as_bytes()).is_ok());
    }

    // -----------------------------------------------------------------------
    // Datastream reads
    // -----------------------------------------------------------------------

    #[test]
    fn datastream_reads_respect_dates_and_states() {
        let (_, engine) = engine();
        let pid = ingest(&engine, "{}").unwrap();
        engine.add_datastream(&ctx(), &pid, &AddDatastream::inline("<a/>")).unwrap();
        let first = engine.get_datastream(&ctx(), &pid, "DS1", None).unwrap().version.created;
        engine
            .modify_datastream_by_value(&ctx(), &pid, &ModifyDatastream::new("DS1").with_content("<b/>"))
            .unwrap();
        engine
            .add_datastream(
                &ctx(),
                &pid,
                &AddDatastream::inline("<c/>").with_state(DatastreamState::Inactive),
            )
            .unwrap();

        let old = engine.get_datastream_content(&ctx(), &pid, "DS1", Some(first)).unwrap();
        assert_eq!(old.bytes, b"<a/>");
        let current = engine.get_datastream_content(&ctx(), &pid, "DS1", None).unwrap();
        assert_eq!(current.version_id, "DS1.1");

        let active = engine
            .get_datastreams(&ctx(), &pid, None, Some(DatastreamState::Active))
            .unwrap();
        assert_eq!(active.len(), 1);
        let at_first = engine.get_datastreams(&ctx(), &pid, Some(first), None).unwrap();
        assert_eq!(at_first.len(), 1);
        assert_eq!(at_first[0].version.version_id, "DS1.0");

        assert_eq!(engine.get_object_history(&ctx(), &pid).unwrap().len(), 3);
    }

    #[test]
    fn managed_content_from_local_files() {
        let (_, engine) = engine();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        std::fs::write(&path, b"local").unwrap();

        let pid = ingest(&engine, "{}").unwrap();
        engine
            .add_datastream(
                &ctx(),
                &pid,
                &AddDatastream::managed(format!("file://{}", path.display())),
            )
            .unwrap();
        engine
            .modify_datastream_by_reference(&ctx(), &pid, &ModifyDatastream::new("DS1"))
            .unwrap();
        std::fs::remove_file(&path).unwrap();

        let copied = engine.get_datastream_content(&ctx(), &pid, "DS1", None).unwrap();
        assert_eq!(copied.bytes, b"local");
    }

    #[test]
    fn upload_needs_staging() {
        let (_, engine) = engine();
        assert_eq!(
            engine.upload(&ctx(), b"x").unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            engine.get_next_pid(&ctx(), 0, None).unwrap_err().kind(),
            ErrorKind::Validation
        );
    }
}
