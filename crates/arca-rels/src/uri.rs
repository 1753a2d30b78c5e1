//! Minimal absolute-URI syntax check.
//!
//! A valid URI here:
//! - Has a scheme: an ASCII letter followed by letters, digits, `+`, `-`, `.`
//! - Has a `:` after the scheme and a non-empty remainder
//! - Contains no whitespace or control characters

use crate::error::{RelError, Result};

/// Validate an absolute URI.
///
/// ```
/// use arca_rels::validate_uri;
///
/// assert!(validate_uri("info:arca/demo:1").is_ok());
/// assert!(validate_uri("http://purl.org/dc/terms/isPartOf").is_ok());
/// assert!(validate_uri("no-scheme").is_err());
/// ```
pub fn validate_uri(value: &str) -> Result<()> {
    let invalid = |reason: &str| RelError::InvalidUri {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let (scheme, rest) = value
        .split_once(':')
        .ok_or_else(|| invalid("missing scheme"))?;

    let mut chars = scheme.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return Err(invalid("scheme must start with a letter")),
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        return Err(invalid("scheme contains forbidden characters"));
    }
    if rest.is_empty() {
        return Err(invalid("nothing follows the scheme"));
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid("contains whitespace or control characters"));
    }
    Ok(())
}
