use std::path::PathBuf;

use arca_gate::Context;
use arca_staging::UPLOAD_SCHEME;
use arca_store::is_internal_location;
use arca_types::ControlGroup;
use tracing::debug;

use crate::error::{ManagementError, ManagementResult};

/// Errors from the content-fetch collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("no content at {0}")]
    NotFound(String),

    #[error("cannot fetch {0}: unsupported scheme")]
    UnsupportedScheme(String),

    #[error("fetch failed: {0}")]
    Io(String),
}

/// Bytes resolved from a location, with the MIME type the source reported.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedContent {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

/// Resolves remote content for externally referenced and managed
/// datastreams.
pub trait ContentFetcher: Send + Sync {
    fn fetch(&self, location: &str, context: &Context) -> Result<FetchedContent, FetchError>;
}

/// Fetcher that serves `file://` URLs from the local filesystem and refuses
/// every other scheme.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalFileFetcher;

impl ContentFetcher for LocalFileFetcher {
    fn fetch(&self, location: &str, context: &Context) -> Result<FetchedContent, FetchError> {
        let Some(path) = location.strip_prefix("file://") else {
            return Err(FetchError::UnsupportedScheme(location.to_string()));
        };
        debug!(location, subject = %context.subject, "fetching local content");
        match std::fs::read(PathBuf::from(path)) {
            Ok(bytes) => Ok(FetchedContent {
                bytes,
                mime_type: None,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FetchError::NotFound(location.to_string()))
            }
            Err(e) => Err(FetchError::Io(format!("{location}: {e}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Location validation
// ---------------------------------------------------------------------------

fn scheme(location: &str) -> Option<&str> {
    let (scheme, rest) = location.split_once("://")?;
    if scheme.is_empty() || rest.is_empty() {
        return None;
    }
    let valid = scheme
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}

/// Whether a location is a staged upload reference.
pub fn is_upload_location(location: &str) -> bool {
    location.starts_with(UPLOAD_SCHEME)
}

/// Check that `location` is acceptable for a datastream of `control_group`.
///
/// Externally referenced content accepts `http`, `https` and `file`;
/// redirects accept `http` and `https` only; managed content also accepts
/// staged uploads and internal locations. Inline XML takes no location.
pub fn validate_location(control_group: ControlGroup, location: &str) -> ManagementResult<()> {
    let location = location.trim();
    if location.is_empty() {
        return Err(ManagementError::validation("content location is empty"));
    }
    let scheme = scheme(location).map(str::to_ascii_lowercase);
    let accepted = match control_group {
        ControlGroup::InlineXml => {
            return Err(ManagementError::validation(
                "inline XML datastreams take content, not a location",
            ))
        }
        ControlGroup::Redirect => matches!(scheme.as_deref(), Some("http" | "https")),
        ControlGroup::ExternallyReferenced => {
            matches!(scheme.as_deref(), Some("http" | "https" | "file"))
        }
        ControlGroup::ManagedContent => {
            matches!(scheme.as_deref(), Some("http" | "https" | "file" | "uploaded"))
                || is_internal_location(location)
        }
    };
    if accepted {
        Ok(())
    } else {
        Err(ManagementError::validation(format!(
            "location {location} is not valid for control group {}",
            control_group.code()
        )))
    }
}
