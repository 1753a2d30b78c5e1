//! Middleware around a [`Management`] implementation.
//!
//! Each layer implements [`Management`] itself and delegates to the layer it
//! wraps, so the stack is assembled by nesting:
//! `LoggingLayer<AuthorizationLayer<ObjectLifecycle>>`.

use std::sync::Arc;
use std::time::Instant;

use arca_gate::{Authorizer, Context, Operation, ResourceAttributes};
use arca_rels::RelationshipTuple;
use arca_store::{DatastreamVersion, ObjectStorage};
use arca_types::{DatastreamId, DatastreamState, Pid, Timestamp};
use tracing::{debug, info, info_span, warn};

use crate::engine::resolve_subject;
use crate::error::ManagementResult;
use crate::management::Management;
use crate::request::{
    AddDatastream, DatastreamContent, DatastreamProfile, IngestRequest, ModifyDatastream,
    ModifyObject, ObjectProfile,
};

// ---------------------------------------------------------------------------
// AuthorizationLayer
// ---------------------------------------------------------------------------

/// Asks an [`Authorizer`] before every operation. A denial returns before
/// the inner layer runs, so nothing is written, no PID is consumed and no
/// upload is staged.
pub struct AuthorizationLayer<M> {
    inner: M,
    authorizer: Arc<dyn Authorizer>,
    /// Source of object owners for owner-based policies.
    owners: Option<Arc<dyn ObjectStorage>>,
}

impl<M: Management> AuthorizationLayer<M> {
    pub fn new(inner: M, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            inner,
            authorizer,
            owners: None,
        }
    }

    /// Look up the owner of the target object before asking the authorizer.
    pub fn with_owner_lookup(mut self, storage: Arc<dyn ObjectStorage>) -> Self {
        self.owners = Some(storage);
        self
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }

    fn with_owner(&self, resource: ResourceAttributes) -> ResourceAttributes {
        let (Some(storage), Some(pid)) = (&self.owners, resource.pid.clone()) else {
            return resource;
        };
        match storage.reader(&pid) {
            Ok(object) => resource.with_owner(object.owner_id),
            Err(e) => {
                debug!(%pid, error = %e, "owner lookup failed");
                resource
            }
        }
    }

    fn enforce(
        &self,
        context: &Context,
        operation: Operation,
        resource: ResourceAttributes,
    ) -> ManagementResult<()> {
        let resource = self.with_owner(resource);
        self.authorizer.enforce(context, operation, &resource)?;
        Ok(())
    }

    fn object(
        &self,
        context: &Context,
        operation: Operation,
        pid: &Pid,
    ) -> ManagementResult<()> {
        self.enforce(context, operation, ResourceAttributes::object(pid))
    }

    fn datastream(
        &self,
        context: &Context,
        operation: Operation,
        pid: &Pid,
        datastream_id: &str,
    ) -> ManagementResult<()> {
        self.enforce(context, operation, ResourceAttributes::datastream(pid, datastream_id))
    }

    fn subject(&self, context: &Context, operation: Operation, subject: &str) -> ManagementResult<()> {
        let (pid, _) = resolve_subject(subject)?;
        self.object(context, operation, &pid)
    }
}

impl<M: Management> Management for AuthorizationLayer<M> {
    fn ingest(&self, context: &Context, request: &IngestRequest) -> ManagementResult<Pid> {
        self.enforce(context, Operation::Ingest, ResourceAttributes::default())?;
        self.inner.ingest(context, request)
    }

    fn modify_object(
        &self,
        context: &Context,
        pid: &Pid,
        request: &ModifyObject,
    ) -> ManagementResult<Timestamp> {
        self.object(context, Operation::ModifyObject, pid)?;
        self.inner.modify_object(context, pid, request)
    }

    fn purge_object(
        &self,
        context: &Context,
        pid: &Pid,
        log_message: &str,
        force: bool,
    ) -> ManagementResult<Timestamp> {
        self.object(context, Operation::PurgeObject, pid)?;
        self.inner.purge_object(context, pid, log_message, force)
    }

    fn export(
        &self,
        context: &Context,
        pid: &Pid,
        format: &str,
        encoding: &str,
    ) -> ManagementResult<Vec<u8>> {
        self.object(context, Operation::Export, pid)?;
        self.inner.export(context, pid, format, encoding)
    }

    fn get_object_xml(&self, context: &Context, pid: &Pid) -> ManagementResult<String> {
        self.object(context, Operation::GetObjectXml, pid)?;
        self.inner.get_object_xml(context, pid)
    }

    fn get_object_profile(&self, context: &Context, pid: &Pid) -> ManagementResult<ObjectProfile> {
        self.object(context, Operation::GetObjectProfile, pid)?;
        self.inner.get_object_profile(context, pid)
    }

    fn get_object_history(&self, context: &Context, pid: &Pid) -> ManagementResult<Vec<Timestamp>> {
        self.object(context, Operation::GetObjectHistory, pid)?;
        self.inner.get_object_history(context, pid)
    }

    fn add_datastream(
        &self,
        context: &Context,
        pid: &Pid,
        request: &AddDatastream,
    ) -> ManagementResult<DatastreamId> {
        let resource = match &request.id {
            Some(id) => ResourceAttributes::datastream(pid, id.as_str()),
            None => ResourceAttributes::object(pid),
        };
        self.enforce(context, Operation::AddDatastream, resource)?;
        self.inner.add_datastream(context, pid, request)
    }

    fn modify_datastream_by_value(
        &self,
        context: &Context,
        pid: &Pid,
        request: &ModifyDatastream,
    ) -> ManagementResult<Timestamp> {
        self.datastream(context, Operation::ModifyDatastreamByValue, pid, &request.id)?;
        self.inner.modify_datastream_by_value(context, pid, request)
    }

    fn modify_datastream_by_reference(
        &self,
        context: &Context,
        pid: &Pid,
        request: &ModifyDatastream,
    ) -> ManagementResult<Timestamp> {
        self.datastream(context, Operation::ModifyDatastreamByReference, pid, &request.id)?;
        self.inner.modify_datastream_by_reference(context, pid, request)
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
        self.datastream(context, Operation::PurgeDatastream, pid, datastream_id)?;
        self.inner
            .purge_datastream(context, pid, datastream_id, start, end, log_message, force)
    }

    fn set_datastream_state(
        &self,
        context: &Context,
        pid: &Pid,
        datastream_id: &str,
        state: DatastreamState,
        log_message: &str,
    ) -> ManagementResult<Timestamp> {
        self.datastream(context, Operation::SetDatastreamState, pid, datastream_id)?;
        self.inner
            .set_datastream_state(context, pid, datastream_id, state, log_message)
    }

    fn set_datastream_versionable(
        &self,
        context: &Context,
        pid: &Pid,
        datastream_id: &str,
        versionable: bool,
        log_message: &str,
    ) -> ManagementResult<Timestamp> {
        self.datastream(context, Operation::SetDatastreamVersionable, pid, datastream_id)?;
        self.inner
            .set_datastream_versionable(context, pid, datastream_id, versionable, log_message)
    }

    fn compare_datastream_checksum(
        &self,
        context: &Context,
        pid: &Pid,
        datastream_id: &str,
        version_date: Option<Timestamp>,
    ) -> ManagementResult<String> {
        self.datastream(context, Operation::CompareDatastreamChecksum, pid, datastream_id)?;
        self.inner
            .compare_datastream_checksum(context, pid, datastream_id, version_date)
    }

    fn get_datastream(
        &self,
        context: &Context,
        pid: &Pid,
        datastream_id: &str,
        as_of: Option<Timestamp>,
    ) -> ManagementResult<DatastreamProfile> {
        self.datastream(context, Operation::GetDatastream, pid, datastream_id)?;
        self.inner.get_datastream(context, pid, datastream_id, as_of)
    }

    fn get_datastreams(
        &self,
        context: &Context,
        pid: &Pid,
        as_of: Option<Timestamp>,
        state: Option<DatastreamState>,
    ) -> ManagementResult<Vec<DatastreamProfile>> {
        self.object(context, Operation::GetDatastreams, pid)?;
        self.inner.get_datastreams(context, pid, as_of, state)
    }

    fn get_datastream_history(
        &self,
        context: &Context,
        pid: &Pid,
        datastream_id: &str,
    ) -> ManagementResult<Vec<DatastreamVersion>> {
        self.datastream(context, Operation::GetDatastreamHistory, pid, datastream_id)?;
        self.inner.get_datastream_history(context, pid, datastream_id)
    }

    fn get_datastream_content(
        &self,
        context: &Context,
        pid: &Pid,
        datastream_id: &str,
        as_of: Option<Timestamp>,
    ) -> ManagementResult<DatastreamContent> {
        self.datastream(context, Operation::GetDatastreamContent, pid, datastream_id)?;
        self.inner
            .get_datastream_content(context, pid, datastream_id, as_of)
    }

    fn get_relationships(
        &self,
        context: &Context,
        subject: &str,
        predicate: Option<&str>,
    ) -> ManagementResult<Vec<RelationshipTuple>> {
        self.subject(context, Operation::GetRelationships, subject)?;
        self.inner.get_relationships(context, subject, predicate)
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
        self.subject(context, Operation::AddRelationship, subject)?;
        self.inner
            .add_relationship(context, subject, predicate, object, is_literal, datatype)
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
        self.subject(context, Operation::PurgeRelationship, subject)?;
        self.inner
            .purge_relationship(context, subject, predicate, object, is_literal, datatype)
    }

    fn get_next_pid(
        &self,
        context: &Context,
        count: usize,
        namespace: Option<&str>,
    ) -> ManagementResult<Vec<Pid>> {
        self.enforce(context, Operation::GetNextPid, ResourceAttributes::default())?;
        self.inner.get_next_pid(context, count, namespace)
    }

    fn upload(&self, context: &Context, bytes: &[u8]) -> ManagementResult<String> {
        self.enforce(context, Operation::Upload, ResourceAttributes::default())?;
        self.inner.upload(context, bytes)
    }
}

impl<M: std::fmt::Debug> std::fmt::Debug for AuthorizationLayer<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationLayer")
            .field("inner", &self.inner)
            .field("owner_lookup", &self.owners.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// LoggingLayer
// ---------------------------------------------------------------------------

/// Wraps every operation in a `management` span and logs its outcome.
#[derive(Debug)]
pub struct LoggingLayer<M> {
    inner: M,
}

impl<M: Management> LoggingLayer<M> {
    pub fn new(inner: M) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }

    fn traced<T>(
        &self,
        context: &Context,
        operation: Operation,
        resource: Option<String>,
        call: impl FnOnce(&M) -> ManagementResult<T>,
    ) -> ManagementResult<T> {
        let span = info_span!(
            "management",
            %operation,
            resource = resource.as_deref().unwrap_or(""),
            subject = %context.subject,
            request_id = %context.request_id,
        );
        let _guard = span.enter();
        let started = Instant::now();
        let result = call(&self.inner);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(elapsed_ms, "operation completed"),
            Err(e) if e.is_fatal() => warn!(elapsed_ms, kind = %e.kind(), error = %e, "operation failed"),
            Err(e) => info!(elapsed_ms, kind = %e.kind(), error = %e, "operation rejected"),
        }
        result
    }
}

impl<M: Management> Management for LoggingLayer<M> {
    fn ingest(&self, context: &Context, request: &IngestRequest) -> ManagementResult<Pid> {
        self.traced(context, Operation::Ingest, None, |m| m.ingest(context, request))
    }

    fn modify_object(
        &self,
        context: &Context,
        pid: &Pid,
        request: &ModifyObject,
    ) -> ManagementResult<Timestamp> {
        self.traced(context, Operation::ModifyObject, Some(pid.to_string()), |m| {
            m.modify_object(context, pid, request)
        })
    }

    fn purge_object(
        &self,
        context: &Context,
        pid: &Pid,
        log_message: &str,
        force: bool,
    ) -> ManagementResult<Timestamp> {
        self.traced(context, Operation::PurgeObject, Some(pid.to_string()), |m| {
            m.purge_object(context, pid, log_message, force)
        })
    }

    fn export(
        &self,
        context: &Context,
        pid: &Pid,
        format: &str,
        encoding: &str,
    ) -> ManagementResult<Vec<u8>> {
        self.traced(context, Operation::Export, Some(pid.to_string()), |m| {
            m.export(context, pid, format, encoding)
        })
    }

    fn get_object_xml(&self, context: &Context, pid: &Pid) -> ManagementResult<String> {
        self.traced(context, Operation::GetObjectXml, Some(pid.to_string()), |m| {
            m.get_object_xml(context, pid)
        })
    }

    fn get_object_profile(&self, context: &Context, pid: &Pid) -> ManagementResult<ObjectProfile> {
        self.traced(context, Operation::GetObjectProfile, Some(pid.to_string()), |m| {
            m.get_object_profile(context, pid)
        })
    }

    fn get_object_history(&self, context: &Context, pid: &Pid) -> ManagementResult<Vec<Timestamp>> {
        self.traced(context, Operation::GetObjectHistory, Some(pid.to_string()), |m| {
            m.get_object_history(context, pid)
        })
    }

    fn add_datastream(
        &self,
        context: &Context,
        pid: &Pid,
        request: &AddDatastream,
    ) -> ManagementResult<DatastreamId> {
        self.traced(context, Operation::AddDatastream, Some(pid.to_string()), |m| {
            m.add_datastream(context, pid, request)
        })
    }

    fn modify_datastream_by_value(
        &self,
        context: &Context,
        pid: &Pid,
        request: &ModifyDatastream,
    ) -> ManagementResult<Timestamp> {
        self.traced(context, Operation::ModifyDatastreamByValue, Some(pid.to_string()), |m| {
            m.modify_datastream_by_value(context, pid, request)
        })
    }

    fn modify_datastream_by_reference(
        &self,
        context: &Context,
        pid: &Pid,
        request: &ModifyDatastream,
    ) -> ManagementResult<Timestamp> {
        self.traced(context, Operation::ModifyDatastreamByReference, Some(pid.to_string()), |m| {
            m.modify_datastream_by_reference(context, pid, request)
        })
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
        self.traced(context, Operation::PurgeDatastream, Some(pid.to_string()), |m| {
            m.purge_datastream(context, pid, datastream_id, start, end, log_message, force)
        })
    }

    fn set_datastream_state(
        &self,
        context: &Context,
        pid: &Pid,
        datastream_id: &str,
        state: DatastreamState,
        log_message: &str,
    ) -> ManagementResult<Timestamp> {
        self.traced(context, Operation::SetDatastreamState, Some(pid.to_string()), |m| {
            m.set_datastream_state(context, pid, datastream_id, state, log_message)
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
        self.traced(context, Operation::SetDatastreamVersionable, Some(pid.to_string()), |m| {
            m.set_datastream_versionable(context, pid, datastream_id, versionable, log_message)
        })
    }

    fn compare_datastream_checksum(
        &self,
        context: &Context,
        pid: &Pid,
        datastream_id: &str,
        version_date: Option<Timestamp>,
    ) -> ManagementResult<String> {
        self.traced(context, Operation::CompareDatastreamChecksum, Some(pid.to_string()), |m| {
            m.compare_datastream_checksum(context, pid, datastream_id, version_date)
        })
    }

    fn get_datastream(
        &self,
        context: &Context,
        pid: &Pid,
        datastream_id: &str,
        as_of: Option<Timestamp>,
    ) -> ManagementResult<DatastreamProfile> {
        self.traced(context, Operation::GetDatastream, Some(pid.to_string()), |m| {
            m.get_datastream(context, pid, datastream_id, as_of)
        })
    }

    fn get_datastreams(
        &self,
        context: &Context,
        pid: &Pid,
        as_of: Option<Timestamp>,
        state: Option<DatastreamState>,
    ) -> ManagementResult<Vec<DatastreamProfile>> {
        self.traced(context, Operation::GetDatastreams, Some(pid.to_string()), |m| {
            m.get_datastreams(context, pid, as_of, state)
        })
    }

    fn get_datastream_history(
        &self,
        context: &Context,
        pid: &Pid,
        datastream_id: &str,
    ) -> ManagementResult<Vec<DatastreamVersion>> {
        self.traced(context, Operation::GetDatastreamHistory, Some(pid.to_string()), |m| {
            m.get_datastream_history(context, pid, datastream_id)
        })
    }

    fn get_datastream_content(
        &self,
        context: &Context,
        pid: &Pid,
        datastream_id: &str,
        as_of: Option<Timestamp>,
    ) -> ManagementResult<DatastreamContent> {
        self.traced(context, Operation::GetDatastreamContent, Some(pid.to_string()), |m| {
            m.get_datastream_content(context, pid, datastream_id, as_of)
        })
    }

    fn get_relationships(
        &self,
        context: &Context,
        subject: &str,
        predicate: Option<&str>,
    ) -> ManagementResult<Vec<RelationshipTuple>> {
        self.traced(context, Operation::GetRelationships, Some(subject.to_string()), |m| {
            m.get_relationships(context, subject, predicate)
        })
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
        self.traced(context, Operation::AddRelationship, Some(subject.to_string()), |m| {
            m.add_relationship(context, subject, predicate, object, is_literal, datatype)
        })
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
        self.traced(context, Operation::PurgeRelationship, Some(subject.to_string()), |m| {
            m.purge_relationship(context, subject, predicate, object, is_literal, datatype)
        })
    }

    fn get_next_pid(
        &self,
        context: &Context,
        count: usize,
        namespace: Option<&str>,
    ) -> ManagementResult<Vec<Pid>> {
        self.traced(context, Operation::GetNextPid, namespace.map(str::to_string), |m| {
            m.get_next_pid(context, count, namespace)
        })
    }

    fn upload(&self, context: &Context, bytes: &[u8]) -> ManagementResult<String> {
        self.traced(context, Operation::Upload, None, |m| m.upload(context, bytes))
    }
}
