use arca_gate::Context;
use arca_rels::RelationshipTuple;
use arca_store::DatastreamVersion;
use arca_types::{DatastreamId, DatastreamState, Pid, Timestamp};

use crate::error::ManagementResult;
use crate::request::{
    AddDatastream, DatastreamContent, DatastreamProfile, IngestRequest, ModifyDatastream,
    ModifyObject, ObjectProfile,
};

/// The management interface of the repository.
///
/// Implemented by [`crate::ObjectLifecycle`], which does the work, and by
/// the middleware layers wrapped around it. Every method takes the caller's
/// [`Context`] first. Methods are safe to call concurrently, including on
/// the same PID; writers on one object are serialized by storage.
pub trait Management: Send + Sync {
    // ---- Objects ----

    /// Create an object from a serialization and return its PID.
    fn ingest(&self, context: &Context, request: &IngestRequest) -> ManagementResult<Pid>;

    fn modify_object(
        &self,
        context: &Context,
        pid: &Pid,
        request: &ModifyObject,
    ) -> ManagementResult<Timestamp>;

    /// Remove an object. `force` is not supported.
    fn purge_object(
        &self,
        context: &Context,
        pid: &Pid,
        log_message: &str,
        force: bool,
    ) -> ManagementResult<Timestamp>;

    fn export(
        &self,
        context: &Context,
        pid: &Pid,
        format: &str,
        encoding: &str,
    ) -> ManagementResult<Vec<u8>>;

    fn get_object_xml(&self, context: &Context, pid: &Pid) -> ManagementResult<String>;

    fn get_object_profile(&self, context: &Context, pid: &Pid) -> ManagementResult<ObjectProfile>;

    /// Creation dates of every version of every datastream, ascending.
    fn get_object_history(&self, context: &Context, pid: &Pid) -> ManagementResult<Vec<Timestamp>>;

    // ---- Datastreams ----

    fn add_datastream(
        &self,
        context: &Context,
        pid: &Pid,
        request: &AddDatastream,
    ) -> ManagementResult<DatastreamId>;

    fn modify_datastream_by_value(
        &self,
        context: &Context,
        pid: &Pid,
        request: &ModifyDatastream,
    ) -> ManagementResult<Timestamp>;

    fn modify_datastream_by_reference(
        &self,
        context: &Context,
        pid: &Pid,
        request: &ModifyDatastream,
    ) -> ManagementResult<Timestamp>;

    /// Remove the versions created in `[start, end]` and return their
    /// creation dates.
    #[allow(clippy::too_many_arguments)]
    fn purge_datastream(
        &self,
        context: &Context,
        pid: &Pid,
        datastream_id: &str,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
        log_message: &str,
        force: bool,
    ) -> ManagementResult<Vec<Timestamp>>;

    fn set_datastream_state(
        &self,
        context: &Context,
        pid: &Pid,
        datastream_id: &str,
        state: DatastreamState,
        log_message: &str,
    ) -> ManagementResult<Timestamp>;

    fn set_datastream_versionable(
        &self,
        context: &Context,
        pid: &Pid,
        datastream_id: &str,
        versionable: bool,
        log_message: &str,
    ) -> ManagementResult<Timestamp>;

    /// Recompute and verify the checksum of the version current at
    /// `version_date`.
    fn compare_datastream_checksum(
        &self,
        context: &Context,
        pid: &Pid,
        datastream_id: &str,
        version_date: Option<Timestamp>,
    ) -> ManagementResult<String>;

    fn get_datastream(
        &self,
        context: &Context,
        pid: &Pid,
        datastream_id: &str,
        as_of: Option<Timestamp>,
    ) -> ManagementResult<DatastreamProfile>;

    fn get_datastreams(
        &self,
        context: &Context,
        pid: &Pid,
        as_of: Option<Timestamp>,
        state: Option<DatastreamState>,
    ) -> ManagementResult<Vec<DatastreamProfile>>;

    /// All versions, newest first.
    fn get_datastream_history(
        &self,
        context: &Context,
        pid: &Pid,
        datastream_id: &str,
    ) -> ManagementResult<Vec<DatastreamVersion>>;

    fn get_datastream_content(
        &self,
        context: &Context,
        pid: &Pid,
        datastream_id: &str,
        as_of: Option<Timestamp>,
    ) -> ManagementResult<DatastreamContent>;

    // ---- Relationships ----

    /// Relationships of `subject`, a PID or `info:arca/` URI, optionally
    /// restricted to one predicate.
    fn get_relationships(
        &self,
        context: &Context,
        subject: &str,
        predicate: Option<&str>,
    ) -> ManagementResult<Vec<RelationshipTuple>>;

    /// Returns `false` when the identical relationship already exists.
    #[allow(clippy::too_many_arguments)]
    fn add_relationship(
        &self,
        context: &Context,
        subject: &str,
        predicate: &str,
        object: &str,
        is_literal: bool,
        datatype: Option<&str>,
    ) -> ManagementResult<bool>;

    /// Returns `false` when no such relationship existed.
    #[allow(clippy::too_many_arguments)]
    fn purge_relationship(
        &self,
        context: &Context,
        subject: &str,
        predicate: &str,
        object: &str,
        is_literal: bool,
        datatype: Option<&str>,
    ) -> ManagementResult<bool>;

    // ---- Administration ----

    /// Issue `count` PIDs without creating objects.
    fn get_next_pid(
        &self,
        context: &Context,
        count: usize,
        namespace: Option<&str>,
    ) -> ManagementResult<Vec<Pid>>;

    /// Stage bytes for a later datastream operation and return their
    /// `uploaded://N` location.
    fn upload(&self, context: &Context, bytes: &[u8]) -> ManagementResult<String>;
}
