//! Relationship statement types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RelError, Result};
use crate::uri::validate_uri;

/// The object position of a relationship statement.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RelObject {
    /// Another resource, identified by URI.
    Resource { uri: String },
    /// A literal value with an optional datatype URI.
    Literal {
        value: String,
        datatype: Option<String>,
    },
}

impl RelObject {
    /// Build the object position from the loose form callers pass in.
    ///
    /// `datatype` is only accepted for literals.
    pub fn from_parts(value: &str, is_literal: bool, datatype: Option<&str>) -> Result<Self> {
        if is_literal {
            if let Some(dt) = datatype {
                validate_uri(dt)?;
            }
            Ok(Self::Literal {
                value: value.to_string(),
                datatype: datatype.map(str::to_string),
            })
        } else {
            if let Some(dt) = datatype {
                return Err(RelError::DatatypeOnResource(dt.to_string()));
            }
            validate_uri(value)?;
            Ok(Self::Resource {
                uri: value.to_string(),
            })
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal { .. })
    }

    /// The URI or literal text, without datatype.
    pub fn value(&self) -> &str {
        match self {
            Self::Resource { uri } => uri,
            Self::Literal { value, .. } => value,
        }
    }
}

impl fmt::Display for RelObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource { uri } => write!(f, "<{uri}>"),
            Self::Literal {
                value,
                datatype: Some(dt),
            } => write!(f, "{value:?}^^<{dt}>"),
            Self::Literal {
                value,
                datatype: None,
            } => write!(f, "{value:?}"),
        }
    }
}

/// A `(subject, predicate, object)` statement attached to a digital object.
///
/// Two tuples are the same statement when subject, predicate, object value,
/// literal flag and datatype all match.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipTuple {
    pub subject: String,
    pub predicate: String,
    pub object: RelObject,
}

impl RelationshipTuple {
    /// Build a validated tuple.
    pub fn new(subject: &str, predicate: &str, object: RelObject) -> Result<Self> {
        validate_uri(subject)?;
        validate_uri(predicate)?;
        Ok(Self {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object,
        })
    }

    pub fn is_literal(&self) -> bool {
        self.object.is_literal()
    }
}

impl fmt::Display for RelationshipTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> <{}> {}", self.subject, self.predicate, self.object)
    }
}
