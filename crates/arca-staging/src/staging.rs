use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, warn};

use crate::error::{StagingError, StagingResult};

/// URI scheme that refers to a staged upload: `uploaded://{handle}`.
pub const UPLOAD_SCHEME: &str = "uploaded://";

/// Extract the handle from an `uploaded://N` location.
///
/// Returns `Ok(None)` for locations of any other scheme.
pub fn parse_upload_location(location: &str) -> StagingResult<Option<u64>> {
    match location.strip_prefix(UPLOAD_SCHEME) {
        None => Ok(None),
        Some(rest) => parse_handle(rest).map(Some),
    }
}

fn parse_handle(value: &str) -> StagingResult<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(StagingError::Malformed(value.to_string()));
    }
    value
        .parse()
        .map_err(|_| StagingError::Malformed(value.to_string()))
}

/// Handle bookkeeping, guarded separately from the sweep schedule.
struct Uploads {
    next_handle: u64,
    started: HashMap<u64, SystemTime>,
}

/// Directory of uploaded blobs with time-based expiry.
pub struct UploadStaging {
    directory: PathBuf,
    ttl: Duration,
    sweep_interval: Duration,
    uploads: Mutex<Uploads>,
    last_sweep: Mutex<Option<Instant>>,
}

impl UploadStaging {
    /// Open (or create) a staging directory.
    ///
    /// Existing uploads are adopted with their file modification time as
    /// start time, so they expire on schedule after a restart.
    pub fn open(directory: &Path, ttl: Duration, sweep_interval: Duration) -> StagingResult<Self> {
        fs::create_dir_all(directory)?;

        let mut started = HashMap::new();
        let mut highest = 0;
        for entry in fs::read_dir(directory)? {
            let entry = entry?;
            let Some(handle) = entry.file_name().to_str().and_then(|n| parse_handle(n).ok()) else {
                continue;
            };
            let modified = entry.metadata()?.modified().unwrap_or_else(|_| SystemTime::now());
            started.insert(handle, modified);
            highest = highest.max(handle);
        }

        debug!(
            directory = %directory.display(),
            adopted = started.len(),
            next_handle = highest + 1,
            "upload staging opened"
        );
        Ok(Self {
            directory: directory.to_path_buf(),
            ttl,
            sweep_interval,
            uploads: Mutex::new(Uploads {
                next_handle: highest + 1,
                started,
            }),
            last_sweep: Mutex::new(None),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Number of live uploads.
    pub fn len(&self) -> usize {
        self.uploads.lock().expect("lock poisoned").started.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store `bytes` and return the new handle.
    pub fn put(&self, bytes: &[u8]) -> StagingResult<u64> {
        self.sweep_if_due();

        let handle = {
            let mut uploads = self.uploads.lock().expect("lock poisoned");
            let handle = uploads.next_handle;
            uploads.next_handle += 1;
            handle
        };

        fs::write(self.path_for(handle), bytes)?;
        self.uploads
            .lock()
            .expect("lock poisoned")
            .started
            .insert(handle, SystemTime::now());

        debug!(handle, size = bytes.len(), "upload staged");
        Ok(handle)
    }

    /// Bytes of a live upload. An upload past its time-to-live is gone
    /// even if no sweep has deleted it yet.
    pub fn get(&self, handle: u64) -> StagingResult<Vec<u8>> {
        let started = self
            .uploads
            .lock()
            .expect("lock poisoned")
            .started
            .get(&handle)
            .copied();
        match started {
            Some(started) if !self.is_expired(started, SystemTime::now()) => {}
            _ => return Err(StagingError::NotFound(handle)),
        }
        match fs::read(self.path_for(handle)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StagingError::NotFound(handle)),
            Err(e) => Err(e.into()),
        }
    }

    /// Bytes of the upload named by an `uploaded://N` location.
    pub fn get_location(&self, location: &str) -> StagingResult<Vec<u8>> {
        match parse_upload_location(location)? {
            Some(handle) => self.get(handle),
            None => Err(StagingError::Malformed(location.to_string())),
        }
    }

    /// Delete an upload. Returns whether it was live.
    pub fn remove(&self, handle: u64) -> StagingResult<bool> {
        let was_live = self
            .uploads
            .lock()
            .expect("lock poisoned")
            .started
            .remove(&handle)
            .is_some();
        match fs::remove_file(self.path_for(handle)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if was_live {
            debug!(handle, "upload consumed");
        }
        Ok(was_live)
    }

    /// Delete every upload older than the time-to-live. Returns how many
    /// were removed.
    pub fn sweep(&self) -> usize {
        let now = SystemTime::now();
        let expired: Vec<u64> = {
            let mut uploads = self.uploads.lock().expect("lock poisoned");
            let expired: Vec<u64> = uploads
                .started
                .iter()
                .filter(|(_, started)| self.is_expired(**started, now))
                .map(|(handle, _)| *handle)
                .collect();
            for handle in &expired {
                uploads.started.remove(handle);
            }
            expired
        };

        let mut removed = 0;
        for handle in expired {
            match fs::remove_file(self.path_for(handle)) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(handle, error = %e, "failed to delete expired upload"),
            }
        }
        if removed > 0 {
            debug!(removed, "expired uploads swept");
        }
        removed
    }

    /// Sweep unless the previous sweep was less than `sweep_interval` ago.
    fn sweep_if_due(&self) {
        {
            let mut last = self.last_sweep.lock().expect("lock poisoned");
            let now = Instant::now();
            if last.is_some_and(|at| now.duration_since(at) < self.sweep_interval) {
                return;
            }
            *last = Some(now);
        }
        self.sweep();
    }

    fn is_expired(&self, started: SystemTime, now: SystemTime) -> bool {
        now.duration_since(started).unwrap_or_default() > self.ttl
    }

    fn path_for(&self, handle: u64) -> PathBuf {
        self.directory.join(handle.to_string())
    }
}

impl std::fmt::Debug for UploadStaging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadStaging")
            .field("directory", &self.directory)
            .field("ttl", &self.ttl)
            .field("uploads", &self.len())
            .finish()
    }
}
