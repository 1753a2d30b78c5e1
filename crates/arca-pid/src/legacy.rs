use std::fs;
use std::io;
use std::path::Path;

use arca_types::Pid;
use tracing::{info, warn};

use crate::error::PidResult;
use crate::generator::PidGenerator;

/// Reserve the last PID recorded in an older deployment's issue log.
///
/// The log is plain text with one issued PID per line. Only the last
/// non-blank line matters. A missing file is not an error. Returns the PID
/// that was reserved, if any.
pub fn recover_legacy_log(generator: &PidGenerator, path: &Path) -> PidResult<Option<Pid>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let Some(last) = text.lines().map(str::trim).filter(|l| !l.is_empty()).last() else {
        return Ok(None);
    };

    match Pid::parse(last) {
        Ok(pid) => {
            generator.reserve(&pid)?;
            info!(pid = %pid, path = %path.display(), "reserved last pid from legacy log");
            Ok(Some(pid))
        }
        Err(e) => {
            warn!(line = last, error = %e, "legacy pid log ends with an unparseable line");
            Err(e.into())
        }
    }
}
