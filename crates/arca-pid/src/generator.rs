use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use arca_types::Pid;
use tracing::{debug, warn};

use crate::error::{PidError, PidResult};
use crate::table::PidTable;

struct GeneratorState {
    highest: HashMap<String, u64>,
    last_issued: Option<Pid>,
}

/// Issues `namespace:n` PIDs with strictly increasing `n` per namespace.
///
/// The read-increment-persist cycle runs under one mutex, so concurrent
/// callers always get distinct suffixes. If persisting fails the caller
/// gets the I/O error but the in-memory mark stays advanced; the suffix is
/// burnt rather than risk issuing it twice.
pub struct PidGenerator {
    table: Arc<dyn PidTable>,
    state: Mutex<GeneratorState>,
}

impl PidGenerator {
    /// Build a generator seeded from every row of `table`.
    pub fn new(table: Arc<dyn PidTable>) -> PidResult<Self> {
        let highest: HashMap<String, u64> = table.load()?.into_iter().collect();
        debug!(namespaces = highest.len(), "pid generator initialized");
        Ok(Self {
            table,
            state: Mutex::new(GeneratorState {
                highest,
                last_issued: None,
            }),
        })
    }

    /// Issue the next PID in `namespace`.
    pub fn generate(&self, namespace: &str) -> PidResult<Pid> {
        let mut state = self.state.lock().expect("lock poisoned");
        let current = state.highest.get(namespace).copied().unwrap_or(0);
        let next = current
            .checked_add(1)
            .ok_or_else(|| PidError::Exhausted(namespace.to_string()))?;
        let pid = Pid::new(namespace, next.to_string())?;

        state.highest.insert(namespace.to_string(), next);
        state.last_issued = Some(pid.clone());
        if let Err(e) = self.table.upsert(namespace, next) {
            warn!(pid = %pid, error = %e, "failed to persist pid high-water mark");
            return Err(e);
        }

        debug!(pid = %pid, "pid generated");
        Ok(pid)
    }

    /// Issue `count` consecutive PIDs in `namespace`.
    pub fn generate_many(&self, namespace: &str, count: usize) -> PidResult<Vec<Pid>> {
        (0..count).map(|_| self.generate(namespace)).collect()
    }

    /// Make sure `pid` and everything below it is never generated.
    ///
    /// PIDs with a non-numeric suffix can never collide with generated ones
    /// and are accepted without effect.
    pub fn reserve(&self, pid: &Pid) -> PidResult<()> {
        let Some(suffix) = pid.numeric_suffix() else {
            return Ok(());
        };
        let mut state = self.state.lock().expect("lock poisoned");
        let current = state.highest.get(pid.namespace()).copied().unwrap_or(0);
        if suffix <= current {
            return Ok(());
        }
        state.highest.insert(pid.namespace().to_string(), suffix);
        if let Err(e) = self.table.upsert(pid.namespace(), suffix) {
            warn!(pid = %pid, error = %e, "failed to persist reserved pid");
            return Err(e);
        }
        debug!(pid = %pid, "pid reserved");
        Ok(())
    }

    /// Reserve every PID in `pids`.
    pub fn reserve_all<'a>(&self, pids: impl IntoIterator<Item = &'a Pid>) -> PidResult<()> {
        pids.into_iter().try_for_each(|pid| self.reserve(pid))
    }

    /// The most recently generated PID, if any since construction.
    pub fn last_issued(&self) -> Option<Pid> {
        self.state.lock().expect("lock poisoned").last_issued.clone()
    }

    /// Highest issued or reserved suffix for `namespace`.
    pub fn highest(&self, namespace: &str) -> Option<u64> {
        self.state.lock().expect("lock poisoned").highest.get(namespace).copied()
    }
}

impl std::fmt::Debug for PidGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().expect("lock poisoned");
        f.debug_struct("PidGenerator")
            .field("namespaces", &state.highest.len())
            .field("last_issued", &state.last_issued)
            .finish()
    }
}
