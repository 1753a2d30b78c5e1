use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// Millisecond-precision UTC timestamp used for every creation and
/// modification date in the repository.
pub type Timestamp = DateTime<Utc>;

/// Source of strictly increasing timestamps.
///
/// Two versions created within the same wall-clock millisecond must still be
/// totally ordered by creation date, so each issued timestamp is at least one
/// millisecond after the previous one. When the wall clock steps backwards
/// the clock keeps counting forward from the last issued value.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last_ms: Mutex<i64>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next timestamp.
    pub fn now(&self) -> Timestamp {
        let wall_ms = Utc::now().timestamp_millis();
        let mut last = self.last_ms.lock().expect("lock poisoned");
        let next = wall_ms.max(*last + 1);
        *last = next;
        from_millis(next)
    }

    /// Make sure every future timestamp is strictly after `seen`.
    ///
    /// Called when objects carrying externally produced dates enter the
    /// repository (ingest), so new versions always sort after old ones.
    pub fn observe(&self, seen: &Timestamp) {
        let mut last = self.last_ms.lock().expect("lock poisoned");
        *last = (*last).max(seen.timestamp_millis());
    }
}

/// Truncate a timestamp to millisecond precision.
pub fn truncate_to_millis(ts: &Timestamp) -> Timestamp {
    from_millis(ts.timestamp_millis())
}

fn from_millis(ms: i64) -> Timestamp {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}
