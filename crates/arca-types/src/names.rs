//! Datastream id and label validation.
//!
//! Valid datastream ids:
//! - Must be non-empty and at most 64 characters
//! - Must start with an ASCII letter or `_`
//! - May contain only ASCII letters, digits, `.`, `-` and `_`
//!
//! Labels are free text, bounded in length and free of control characters.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Maximum length of a datastream id.
const MAX_DATASTREAM_ID_LENGTH: usize = 64;

/// Ids that can never be used for a caller-created datastream.
pub const RESERVED_DATASTREAM_IDS: &[&str] = &["AUDIT", "FEDORA-AUDITTRAIL"];

/// Identifier of a datastream, unique within its object.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatastreamId(String);

impl DatastreamId {
    /// Parse and validate a datastream id.
    ///
    /// Reserved ids are syntactically valid and accepted here; refusing them
    /// is a lifecycle rule, see [`DatastreamId::is_reserved`].
    ///
    /// ```
    /// use arca_types::DatastreamId;
    ///
    /// assert!(DatastreamId::parse("DC").is_ok());
    /// assert!(DatastreamId::parse("MASTER_TIFF.v2").is_ok());
    /// assert!(DatastreamId::parse("").is_err());
    /// assert!(DatastreamId::parse("1ST").is_err());
    /// ```
    pub fn parse(value: &str) -> Result<Self, TypeError> {
        let invalid = |reason: String| TypeError::InvalidDatastreamId {
            value: value.to_string(),
            reason,
        };

        let first = value
            .chars()
            .next()
            .ok_or_else(|| invalid("must not be empty".into()))?;
        if value.len() > MAX_DATASTREAM_ID_LENGTH {
            return Err(invalid(format!(
                "longer than {MAX_DATASTREAM_ID_LENGTH} characters"
            )));
        }
        if !(first.is_ascii_alphabetic() || first == '_') {
            return Err(invalid("must start with a letter or '_'".into()));
        }
        if let Some(ch) = value
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')))
        {
            return Err(invalid(format!("contains forbidden character {ch:?}")));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this id names the audit trail pseudo-stream.
    pub fn is_reserved(&self) -> bool {
        RESERVED_DATASTREAM_IDS.contains(&self.0.as_str())
    }

    /// Version id for the `n`th accepted version: `{id}.{n}`.
    pub fn version_id(&self, n: u32) -> String {
        format!("{}.{n}", self.0)
    }
}

impl fmt::Display for DatastreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for DatastreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DatastreamId({})", self.0)
    }
}

impl Borrow<str> for DatastreamId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DatastreamId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DatastreamId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DatastreamId> for String {
    fn from(id: DatastreamId) -> Self {
        id.0
    }
}

/// Validate an object or datastream label.
pub fn validate_label(label: &str, max_length: usize) -> Result<(), TypeError> {
    let length = label.chars().count();
    if length > max_length {
        return Err(TypeError::InvalidLabel(format!(
            "{length} characters exceeds maximum of {max_length}"
        )));
    }
    if let Some(ch) = label.chars().find(|c| c.is_control()) {
        return Err(TypeError::InvalidLabel(format!(
            "contains control character {ch:?}"
        )));
    }
    Ok(())
}
