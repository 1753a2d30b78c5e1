use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PidError, PidResult};

/// Persistent `namespace -> highest issued suffix` table.
///
/// Implementations must make an upsert durable before returning `Ok`.
pub trait PidTable: Send + Sync {
    /// Every namespace with its highest recorded suffix.
    fn load(&self) -> PidResult<BTreeMap<String, u64>>;

    /// Insert the namespace if unseen, otherwise overwrite its value.
    fn upsert(&self, namespace: &str, highest_id: u64) -> PidResult<()>;
}

// ---------------------------------------------------------------------------
// InMemoryPidTable
// ---------------------------------------------------------------------------

/// Volatile table. Cloning the map out of `load` makes it usable to simulate
/// a restart by building a second generator over the same table.
#[derive(Debug, Default)]
pub struct InMemoryPidTable {
    rows: Mutex<BTreeMap<String, u64>>,
}

impl InMemoryPidTable {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PidTable for InMemoryPidTable {
    fn load(&self) -> PidResult<BTreeMap<String, u64>> {
        Ok(self.rows.lock().expect("lock poisoned").clone())
    }

    fn upsert(&self, namespace: &str, highest_id: u64) -> PidResult<()> {
        self.rows
            .lock()
            .expect("lock poisoned")
            .insert(namespace.to_string(), highest_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FilePidTable
// ---------------------------------------------------------------------------

/// One upsert as written to disk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct PidRow {
    namespace: String,
    highest_id: u64,
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// Append-only upsert log.
///
/// On-disk format, repeated per upsert:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized row)]
/// ```
///
/// Loading replays the log front to back; the last row for a namespace
/// wins. A torn tail left by a crash is cut off when the table is opened,
/// so later rows are appended after the last good one. A short header, a
/// short payload and a damaged final row all count as a torn tail. A bad row anywhere
/// else fails the load with [`PidError::Corrupt`]. Every upsert is fsynced
/// before it returns.
pub struct FilePidTable {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

/// Result of replaying the log.
struct Replay {
    rows: BTreeMap<String, u64>,
    /// End of the last intact row.
    valid_end: u64,
}

impl FilePidTable {
    /// Open (or create) the table file at `path`, truncating a torn tail.
    pub fn open(path: &Path) -> PidResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let replay = replay(path)?;
        let length = file.metadata()?.len();
        if replay.valid_end < length {
            warn!(
                path = %path.display(),
                valid_end = replay.valid_end,
                length,
                "truncating torn pid table tail"
            );
            file.set_len(replay.valid_end)?;
            file.sync_all()?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the log with one row per namespace.
    ///
    /// The new log is written to a temporary file in the same directory and
    /// renamed over the old one, so a crash leaves either log intact.
    pub fn compact(&self) -> PidResult<()> {
        let mut writer = self.writer.lock().expect("lock poisoned");
        writer.flush()?;
        let rows = replay(&self.path)?.rows;

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        for (namespace, highest_id) in &rows {
            write_row(tmp.as_file_mut(), namespace, *highest_id)?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| PidError::Io(e.error))?;

        let file = OpenOptions::new().read(true).append(true).open(&self.path)?;
        *writer = BufWriter::new(file);
        debug!(path = %self.path.display(), namespaces = rows.len(), "pid table compacted");
        Ok(())
    }
}

fn replay(path: &Path) -> PidResult<Replay> {
    let file = File::open(path)?;
    let length = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let mut rows = BTreeMap::new();
    let mut offset: u64 = 0;

    while offset < length {
        if length - offset < HEADER_SIZE as u64 {
            warn!(offset, "short pid table header at tail");
            break;
        }
        let mut header = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header)?;
        let payload_len =
            u64::from(u32::from_le_bytes([header[0], header[1], header[2], header[3]]));
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        let end = offset + HEADER_SIZE as u64 + payload_len;
        if end > length {
            warn!(offset, payload_len, "short pid table row at tail");
            break;
        }
        let mut payload = vec![0u8; payload_len as usize];
        reader.read_exact(&mut payload)?;
        let at_tail = reader.fill_buf()?.is_empty();

        let actual_crc = crc32fast::hash(&payload);
        let row = if actual_crc != expected_crc {
            Err(format!("CRC mismatch (expected {expected_crc:#010x}, got {actual_crc:#010x})"))
        } else {
            bincode::deserialize::<PidRow>(&payload).map_err(|e| format!("undecodable row: {e}"))
        };
        match row {
            Ok(row) => {
                rows.insert(row.namespace, row.highest_id);
            }
            Err(reason) if at_tail => {
                warn!(offset, %reason, "damaged pid table row at tail");
                break;
            }
            Err(reason) => return Err(PidError::Corrupt { offset, reason }),
        }
        offset = end;
    }

    Ok(Replay {
        rows,
        valid_end: offset,
    })
}

fn write_row(out: &mut impl Write, namespace: &str, highest_id: u64) -> PidResult<()> {
    let row = PidRow {
        namespace: namespace.to_string(),
        highest_id,
    };
    let payload = bincode::serialize(&row).map_err(|e| PidError::Serialization(e.to_string()))?;
    out.write_all(&(payload.len() as u32).to_le_bytes())?;
    out.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    out.write_all(&payload)?;
    Ok(())
}

impl PidTable for FilePidTable {
    fn load(&self) -> PidResult<BTreeMap<String, u64>> {
        self.writer.lock().expect("lock poisoned").flush()?;
        let rows = replay(&self.path)?.rows;
        debug!(path = %self.path.display(), namespaces = rows.len(), "pid table loaded");
        Ok(rows)
    }

    fn upsert(&self, namespace: &str, highest_id: u64) -> PidResult<()> {
        let mut writer = self.writer.lock().expect("lock poisoned");
        write_row(&mut *writer, namespace, highest_id)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }
}

impl std::fmt::Debug for FilePidTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePidTable").field("path", &self.path).finish()
    }
}
