use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex, RwLock};
use std::time::{Duration, Instant};

use arca_audit::AuditTrail;
use arca_types::Pid;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::object::DigitalObject;
use crate::traits::{ObjectStorage, ObjectWriter};

/// Default time a writer acquisition waits for a competing writer.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// In-memory, HashMap-based object storage.
///
/// Intended for tests and embedding. Objects and managed content are held
/// behind `RwLock`s; readers get clones. Writer exclusivity is a set of
/// locked PIDs guarded by a `Mutex` and signalled through a `Condvar`.
pub struct InMemoryStorage {
    objects: RwLock<HashMap<Pid, DigitalObject>>,
    content: RwLock<HashMap<String, Vec<u8>>>,
    tombstones: RwLock<HashMap<Pid, AuditTrail>>,
    locked: Mutex<HashSet<Pid>>,
    released: Condvar,
    lock_timeout: Duration,
}

impl InMemoryStorage {
    /// Create a new empty storage with the default lock timeout.
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            content: RwLock::new(HashMap::new()),
            tombstones: RwLock::new(HashMap::new()),
            locked: Mutex::new(HashSet::new()),
            released: Condvar::new(),
            lock_timeout,
        }
    }

    /// Number of committed objects.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Number of committed managed content entries.
    pub fn content_count(&self) -> usize {
        self.content.read().expect("lock poisoned").len()
    }

    /// Sorted PIDs of all committed objects.
    pub fn all_pids(&self) -> Vec<Pid> {
        let map = self.objects.read().expect("lock poisoned");
        let mut pids: Vec<Pid> = map.keys().cloned().collect();
        pids.sort();
        pids
    }

    fn acquire(&self, pid: &Pid) -> StoreResult<()> {
        let deadline = Instant::now() + self.lock_timeout;
        let mut held = self.locked.lock().expect("lock poisoned");
        while held.contains(pid) {
            let now = Instant::now();
            if now >= deadline {
                warn!(pid = %pid, timeout = ?self.lock_timeout, "writer lock timed out");
                return Err(StoreError::LockTimeout {
                    pid: pid.clone(),
                    waited: self.lock_timeout,
                });
            }
            let (guard, _) = self
                .released
                .wait_timeout(held, deadline - now)
                .expect("lock poisoned");
            held = guard;
        }
        held.insert(pid.clone());
        debug!(pid = %pid, "writer lock acquired");
        Ok(())
    }

    fn release(&self, pid: &Pid) {
        // Runs from Drop, so a poisoned lock must not panic again.
        if let Ok(mut held) = self.locked.lock() {
            held.remove(pid);
        }
        self.released.notify_all();
        debug!(pid = %pid, "writer lock released");
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStorage for InMemoryStorage {
    fn reader(&self, pid: &Pid) -> StoreResult<DigitalObject> {
        let map = self.objects.read().expect("lock poisoned");
        map.get(pid)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(pid.clone()))
    }

    fn writer(&self, pid: &Pid) -> StoreResult<Box<dyn ObjectWriter + '_>> {
        self.acquire(pid)?;
        let current = self.objects.read().expect("lock poisoned").get(pid).cloned();
        match current {
            Some(object) => Ok(Box::new(MemoryWriter::new(self, object, false))),
            None => {
                self.release(pid);
                Err(StoreError::NotFound(pid.clone()))
            }
        }
    }

    fn ingest_writer(&self, object: DigitalObject) -> StoreResult<Box<dyn ObjectWriter + '_>> {
        self.acquire(&object.pid)?;
        if self.objects.read().expect("lock poisoned").contains_key(&object.pid) {
            self.release(&object.pid);
            return Err(StoreError::AlreadyExists(object.pid));
        }
        Ok(Box::new(MemoryWriter::new(self, object, true)))
    }

    fn object_exists(&self, pid: &Pid) -> StoreResult<bool> {
        Ok(self.objects.read().expect("lock poisoned").contains_key(pid))
    }

    fn read_content(&self, location: &str) -> StoreResult<Vec<u8>> {
        let map = self.content.read().expect("lock poisoned");
        map.get(location)
            .cloned()
            .ok_or_else(|| StoreError::ContentNotFound(location.to_string()))
    }

    fn purged_audit_trail(&self, pid: &Pid) -> StoreResult<Option<AuditTrail>> {
        Ok(self.tombstones.read().expect("lock poisoned").get(pid).cloned())
    }
}

impl std::fmt::Debug for InMemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStorage")
            .field("object_count", &self.len())
            .field("content_count", &self.content_count())
            .field("lock_timeout", &self.lock_timeout)
            .finish()
    }
}

/// Writer over an [`InMemoryStorage`]; holds the PID lock until dropped.
struct MemoryWriter<'a> {
    storage: &'a InMemoryStorage,
    pid: Pid,
    object: DigitalObject,
    pending: HashMap<String, Vec<u8>>,
    removed: bool,
    is_new: bool,
}

impl<'a> MemoryWriter<'a> {
    fn new(storage: &'a InMemoryStorage, object: DigitalObject, is_new: bool) -> Self {
        Self {
            storage,
            pid: object.pid.clone(),
            object,
            pending: HashMap::new(),
            removed: false,
            is_new,
        }
    }
}

impl ObjectWriter for MemoryWriter<'_> {
    fn pid(&self) -> &Pid {
        &self.pid
    }

    fn object(&self) -> &DigitalObject {
        &self.object
    }

    fn object_mut(&mut self) -> &mut DigitalObject {
        &mut self.object
    }

    fn put_content(&mut self, location: &str, bytes: Vec<u8>) -> StoreResult<()> {
        self.pending.insert(location.to_string(), bytes);
        Ok(())
    }

    fn read_content(&self, location: &str) -> StoreResult<Vec<u8>> {
        match self.pending.get(location) {
            Some(bytes) => Ok(bytes.clone()),
            None => self.storage.read_content(location),
        }
    }

    fn remove(&mut self) {
        self.removed = true;
    }

    fn is_removed(&self) -> bool {
        self.removed
    }

    fn commit(&mut self, log_message: &str) -> StoreResult<()> {
        let mut objects = self.storage.objects.write().expect("lock poisoned");
        let mut content = self.storage.content.write().expect("lock poisoned");

        if self.removed {
            if let Some(previous) = objects.remove(&self.pid) {
                for location in previous.owned_locations() {
                    content.remove(&location);
                }
            }
            self.pending.clear();
            self.storage
                .tombstones
                .write()
                .expect("lock poisoned")
                .insert(self.pid.clone(), self.object.audit_trail.clone());
            debug!(pid = %self.pid, message = log_message, "object removed");
            return Ok(());
        }

        if self.is_new && objects.contains_key(&self.pid) {
            return Err(StoreError::AlreadyExists(self.pid.clone()));
        }

        let referenced = self.object.internal_locations();
        if let Some(previous) = objects.get(&self.pid) {
            for stale in previous.owned_locations().difference(&referenced) {
                content.remove(stale);
            }
        }
        for (location, bytes) in self.pending.drain() {
            if referenced.contains(&location) {
                content.insert(location, bytes);
            }
        }
        objects.insert(self.pid.clone(), self.object.clone());
        self.is_new = false;

        debug!(pid = %self.pid, message = log_message, "object committed");
        Ok(())
    }
}

impl Drop for MemoryWriter<'_> {
    fn drop(&mut self) {
        self.storage.release(&self.pid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{internal_location, Datastream, DatastreamVersion, VersionContent};
    use arca_types::{ControlGroup, DatastreamId, DatastreamState};
    use chrono::{Duration as ChronoDuration, Utc};

    fn pid(s: &str) -> Pid {
        Pid::parse(s).unwrap()
    }

    fn ingest(storage: &InMemoryStorage, p: &str) {
        let object = DigitalObject::new(pid(p), "label", "owner", Utc::now());
        let mut writer = storage.ingest_writer(object).unwrap();
        writer.commit("ingest").unwrap();
    }

    fn add_managed_version(writer: &mut dyn ObjectWriter, bytes: &[u8]) -> String {
        let pid = writer.pid().clone();
        let id = DatastreamId::parse("DS1").unwrap();
        let object = writer.object_mut();
        if !object.has_datastream("DS1") {
            object.insert_datastream(Datastream::new(
                id.clone(),
                ControlGroup::ManagedContent,
                true,
                DatastreamState::Active,
            ));
        }
        let ds = object.datastream_mut("DS1").unwrap();
        let version_id = ds.next_version_id();
        let created = ds
            .current()
            .map_or_else(Utc::now, |c| c.created + ChronoDuration::milliseconds(1));
        let location = internal_location(&pid, &id, &version_id);
        ds.push_version(DatastreamVersion {
            version_id,
            label: String::new(),
            mime_type: "application/octet-stream".into(),
            format_uri: None,
            alt_ids: vec![],
            content: VersionContent::Location(location.clone()),
            checksum_type: "DISABLED".into(),
            checksum: None,
            size: Some(bytes.len() as u64),
            created,
        });
        writer.put_content(&location, bytes.to_vec()).unwrap();
        location
    }

    // -----------------------------------------------------------------------
    // Visibility
    // -----------------------------------------------------------------------

    #[test]
    fn reader_of_missing_object_fails() {
        let storage = InMemoryStorage::new();
        assert!(matches!(storage.reader(&pid("demo:1")), Err(StoreError::NotFound(_))));
        assert!(matches!(storage.writer(&pid("demo:1")), Err(StoreError::NotFound(_))));
        // The failed writer must not leave the lock behind.
        ingest(&storage, "demo:1");
    }

    #[test]
    fn changes_are_invisible_until_commit() {
        let storage = InMemoryStorage::new();
        ingest(&storage, "demo:1");

        let mut writer = storage.writer(&pid("demo:1")).unwrap();
        writer.object_mut().label = "changed".into();
        let location = add_managed_version(writer.as_mut(), b"bytes");
        assert_eq!(storage.reader(&pid("demo:1")).unwrap().label, "label");
        assert!(storage.read_content(&location).is_err());
        assert_eq!(writer.read_content(&location).unwrap(), b"bytes");

        writer.commit("modify").unwrap();
        assert_eq!(storage.reader(&pid("demo:1")).unwrap().label, "changed");
        assert_eq!(storage.read_content(&location).unwrap(), b"bytes");
    }

    #[test]
    fn dropping_a_writer_discards_changes() {
        let storage = InMemoryStorage::new();
        ingest(&storage, "demo:1");
        {
            let mut writer = storage.writer(&pid("demo:1")).unwrap();
            writer.object_mut().label = "lost".into();
            add_managed_version(writer.as_mut(), b"lost");
        }
        assert_eq!(storage.reader(&pid("demo:1")).unwrap().label, "label");
        assert_eq!(storage.content_count(), 0);
    }

    #[test]
    fn unreferenced_content_is_collected() {
        let storage = InMemoryStorage::new();
        ingest(&storage, "demo:1");
        let mut writer = storage.writer(&pid("demo:1")).unwrap();
        let first = add_managed_version(writer.as_mut(), b"one");
        writer.commit("v0").unwrap();
        assert_eq!(storage.content_count(), 1);

        writer.object_mut().remove_datastream("DS1");
        writer.commit("purge").unwrap();
        assert_eq!(storage.content_count(), 0);
        assert!(storage.read_content(&first).is_err());
    }

    #[test]
    fn content_of_other_objects_is_never_collected() {
        let storage = InMemoryStorage::new();
        ingest(&storage, "demo:1");
        let mut writer = storage.writer(&pid("demo:1")).unwrap();
        let original = add_managed_version(writer.as_mut(), b"original");
        writer.commit("add").unwrap();
        drop(writer);

        // demo:2 points at demo:1's bytes, then drops and is removed.
        ingest(&storage, "demo:2");
        let mut writer = storage.writer(&pid("demo:2")).unwrap();
        add_managed_version(writer.as_mut(), b"own");
        let ds = writer.object_mut().datastream_mut("DS1").unwrap();
        let mut borrowed = ds.current().unwrap().clone();
        borrowed.version_id = ds.next_version_id();
        borrowed.created += ChronoDuration::milliseconds(1);
        borrowed.content = VersionContent::Location(original.clone());
        ds.push_version(borrowed);
        writer.commit("borrow").unwrap();

        writer.object_mut().remove_datastream("DS1");
        writer.commit("purge").unwrap();
        assert_eq!(storage.read_content(&original).unwrap(), b"original");

        writer.remove();
        writer.commit("remove").unwrap();
        drop(writer);
        assert_eq!(storage.read_content(&original).unwrap(), b"original");
        assert_eq!(storage.content_count(), 1);
    }

    // -----------------------------------------------------------------------
    // Ingest and removal
    // -----------------------------------------------------------------------

    #[test]
    fn duplicate_ingest_is_rejected() {
        let storage = InMemoryStorage::new();
        ingest(&storage, "demo:1");
        let again = DigitalObject::new(pid("demo:1"), "", "", Utc::now());
        assert!(matches!(storage.ingest_writer(again), Err(StoreError::AlreadyExists(_))));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn removal_keeps_audit_tombstone() {
        let storage = InMemoryStorage::new();
        ingest(&storage, "demo:1");
        let mut writer = storage.writer(&pid("demo:1")).unwrap();
        add_managed_version(writer.as_mut(), b"x");
        writer.commit("add").unwrap();
        writer.remove();
        assert!(writer.is_removed());
        writer.commit("purge").unwrap();
        drop(writer);

        assert!(!storage.object_exists(&pid("demo:1")).unwrap());
        assert_eq!(storage.content_count(), 0);
        assert!(storage.purged_audit_trail(&pid("demo:1")).unwrap().is_some());
        assert!(storage.purged_audit_trail(&pid("demo:2")).unwrap().is_none());
    }

    // -----------------------------------------------------------------------
    // Writer exclusivity
    // -----------------------------------------------------------------------

    #[test]
    fn second_writer_times_out() {
        let storage = InMemoryStorage::with_lock_timeout(Duration::from_millis(50));
        ingest(&storage, "demo:1");
        let _held = storage.writer(&pid("demo:1")).unwrap();
        let Err(err) = storage.writer(&pid("demo:1")) else {
            panic!("second writer acquired the lock");
        };
        assert!(matches!(err, StoreError::LockTimeout { .. }));
        // Other objects are unaffected.
        ingest(&storage, "demo:2");
        assert!(storage.writer(&pid("demo:2")).is_ok());
    }

    #[test]
    fn waiting_writer_proceeds_after_release() {
        let storage = InMemoryStorage::with_lock_timeout(Duration::from_secs(5));
        ingest(&storage, "demo:1");
        let held = storage.writer(&pid("demo:1")).unwrap();

        std::thread::scope(|scope| {
            let waiter = scope.spawn(|| {
                let mut writer = storage.writer(&pid("demo:1")).unwrap();
                writer.object_mut().label = "second".into();
                writer.commit("second").unwrap();
            });
            std::thread::sleep(Duration::from_millis(50));
            drop(held);
            waiter.join().unwrap();
        });

        assert_eq!(storage.reader(&pid("demo:1")).unwrap().label, "second");
    }
}
