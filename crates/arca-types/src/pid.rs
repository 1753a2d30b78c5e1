use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// URI prefix used when a PID appears as an RDF subject or object.
pub const PID_URI_PREFIX: &str = "info:arca/";

/// Maximum length of a PID including the separating colon.
const MAX_PID_LENGTH: usize = 64;

/// Persistent identifier of a digital object: `namespace:suffix`.
///
/// The namespace is made of ASCII letters, digits, `.` and `-`. The suffix
/// additionally allows `~` and `_`, and percent-escapes written with
/// uppercase hex digits (`%2F`). Generator-issued suffixes are always
/// decimal integers, which is what [`Pid::numeric_suffix`] recognises.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pid {
    namespace: String,
    suffix: String,
}

impl Pid {
    /// Build a PID from its parts, validating both.
    pub fn new(namespace: impl Into<String>, suffix: impl Into<String>) -> Result<Self, TypeError> {
        let namespace = namespace.into();
        let suffix = suffix.into();
        let joined = format!("{namespace}:{suffix}");
        validate_parts(&joined, &namespace, &suffix)?;
        Ok(Self { namespace, suffix })
    }

    /// Parse a PID from its `namespace:suffix` form.
    pub fn parse(value: &str) -> Result<Self, TypeError> {
        let (namespace, suffix) = value.split_once(':').ok_or_else(|| TypeError::InvalidPid {
            value: value.to_string(),
            reason: "missing ':' separator".into(),
        })?;
        validate_parts(value, namespace, suffix)?;
        Ok(Self {
            namespace: namespace.to_string(),
            suffix: suffix.to_string(),
        })
    }

    /// Parse either a bare PID (`demo:1`) or its URI form (`info:arca/demo:1`).
    ///
    /// Anything after the first `/` following the PID (a component path such
    /// as `info:arca/demo:1/DS1`) is ignored, so the owning object's PID can
    /// be derived from a component URI.
    pub fn from_uri_or_pid(value: &str) -> Result<Self, TypeError> {
        let bare = value.strip_prefix(PID_URI_PREFIX).unwrap_or(value);
        let bare = bare.split('/').next().unwrap_or(bare);
        Self::parse(bare)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// The suffix as an integer, if it is purely decimal.
    pub fn numeric_suffix(&self) -> Option<u64> {
        if self.suffix.bytes().all(|b| b.is_ascii_digit()) {
            self.suffix.parse().ok()
        } else {
            None
        }
    }

    /// `info:arca/{namespace}:{suffix}`
    pub fn to_uri(&self) -> String {
        format!("{PID_URI_PREFIX}{self}")
    }
}

fn validate_parts(value: &str, namespace: &str, suffix: &str) -> Result<(), TypeError> {
    let invalid = |reason: String| TypeError::InvalidPid {
        value: value.to_string(),
        reason,
    };

    if value.len() > MAX_PID_LENGTH {
        return Err(invalid(format!("longer than {MAX_PID_LENGTH} characters")));
    }
    if namespace.is_empty() {
        return Err(invalid("namespace must not be empty".into()));
    }
    if suffix.is_empty() {
        return Err(invalid("suffix must not be empty".into()));
    }
    if let Some(ch) = namespace
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '.' || *c == '-'))
    {
        return Err(invalid(format!("namespace contains forbidden character {ch:?}")));
    }

    let bytes = suffix.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'%' {
            let escape = bytes.get(i + 1..i + 3).unwrap_or_default();
            let valid = escape.len() == 2
                && escape
                    .iter()
                    .all(|h| h.is_ascii_digit() || (b'A'..=b'F').contains(h));
            if !valid {
                return Err(invalid(format!("malformed percent-escape at offset {i}")));
            }
            i += 3;
            continue;
        }
        if !(b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'~' | b'_')) {
            return Err(invalid(format!(
                "suffix contains forbidden character {:?}",
                b as char
            )));
        }
        i += 1;
    }
    Ok(())
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.suffix)
    }
}

impl fmt::Debug for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pid({self})")
    }
}

impl FromStr for Pid {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Pid {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Pid> for String {
    fn from(pid: Pid) -> Self {
        pid.to_string()
    }
}
