use arca_audit::AuditTrail;
use arca_types::Pid;

use crate::error::StoreResult;
use crate::object::DigitalObject;
use crate::serialization::ObjectRecord;

/// Persistent home of digital objects and their managed content.
///
/// All implementations must satisfy these invariants:
/// - At most one [`ObjectWriter`] per PID exists at a time. A second
///   acquisition blocks until the first writer is dropped or the backend's
///   lock timeout elapses.
/// - Changes made through a writer, including managed content placed with
///   [`ObjectWriter::put_content`], become visible to readers only when
///   [`ObjectWriter::commit`] succeeds.
/// - Readers are snapshots of committed state and never block writers.
/// - Managed content no longer referenced by any committed version is
///   removed at commit time.
pub trait ObjectStorage: Send + Sync {
    /// Snapshot of the committed object.
    fn reader(&self, pid: &Pid) -> StoreResult<DigitalObject>;

    /// Exclusive writer for an existing object.
    fn writer(&self, pid: &Pid) -> StoreResult<Box<dyn ObjectWriter + '_>>;

    /// Exclusive writer for a new object. Commit fails with
    /// `AlreadyExists` if another object with the same PID was committed in
    /// the meantime.
    fn ingest_writer(&self, object: DigitalObject) -> StoreResult<Box<dyn ObjectWriter + '_>>;

    fn object_exists(&self, pid: &Pid) -> StoreResult<bool>;

    /// Bytes of committed managed content at an internal location.
    fn read_content(&self, location: &str) -> StoreResult<Vec<u8>>;

    /// Audit trail of an object removed by a committed purge, if any.
    fn purged_audit_trail(&self, pid: &Pid) -> StoreResult<Option<AuditTrail>>;

    /// Parse a serialization the backend understands.
    fn decode(&self, serialization: &[u8], format: &str, encoding: &str) -> StoreResult<ObjectRecord> {
        ObjectRecord::decode(serialization, format, encoding)
    }

    /// Serialize a committed object.
    fn encode(&self, object: &DigitalObject, format: &str, encoding: &str) -> StoreResult<Vec<u8>> {
        ObjectRecord::from_object(object).encode(format, encoding)
    }
}

/// Exclusive, uncommitted handle on one object.
///
/// Dropping a writer releases the object lock and discards everything not
/// yet committed.
pub trait ObjectWriter: Send {
    fn pid(&self) -> &Pid;

    /// The working copy.
    fn object(&self) -> &DigitalObject;

    fn object_mut(&mut self) -> &mut DigitalObject;

    /// Stage managed content under an internal location.
    fn put_content(&mut self, location: &str, bytes: Vec<u8>) -> StoreResult<()>;

    /// Content staged in this writer, falling back to committed content.
    fn read_content(&self, location: &str) -> StoreResult<Vec<u8>>;

    /// Mark the object for removal on commit.
    fn remove(&mut self);

    fn is_removed(&self) -> bool;

    /// Make every change visible atomically. The writer stays locked until
    /// it is dropped; further commits are allowed.
    fn commit(&mut self, log_message: &str) -> StoreResult<()>;
}
