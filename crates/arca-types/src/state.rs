use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Lifecycle state of a digital object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectState {
    Active,
    Inactive,
    Deleted,
}

/// Lifecycle state of a datastream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatastreamState {
    Active,
    Inactive,
    Deleted,
}

macro_rules! state_codes {
    ($ty:ident, $kind:literal) => {
        impl $ty {
            /// Single-letter code: `A`, `I` or `D`.
            pub fn code(&self) -> &'static str {
                match self {
                    Self::Active => "A",
                    Self::Inactive => "I",
                    Self::Deleted => "D",
                }
            }
        }

        impl FromStr for $ty {
            type Err = TypeError;

            /// Accepts the single-letter code or the full name, case-insensitively.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    "a" | "active" => Ok(Self::Active),
                    "i" | "inactive" => Ok(Self::Inactive),
                    "d" | "deleted" => Ok(Self::Deleted),
                    _ => Err(TypeError::UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.code())
            }
        }
    };
}

state_codes!(ObjectState, "object state");
state_codes!(DatastreamState, "datastream state");

/// Storage mode of a datastream, fixed when the datastream is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlGroup {
    /// XML content embedded in the object record.
    InlineXml,
    /// Content stored and managed by the repository.
    ManagedContent,
    /// Content held elsewhere and referenced by URL.
    ExternallyReferenced,
    /// Content held elsewhere; clients are redirected to the URL.
    Redirect,
}

impl ControlGroup {
    /// Single-letter code: `X`, `M`, `E` or `R`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InlineXml => "X",
            Self::ManagedContent => "M",
            Self::ExternallyReferenced => "E",
            Self::Redirect => "R",
        }
    }

    /// Inline XML is modified by value; all other groups by reference.
    pub fn is_by_value(&self) -> bool {
        matches!(self, Self::InlineXml)
    }
}

impl FromStr for ControlGroup {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "X" => Ok(Self::InlineXml),
            "M" => Ok(Self::ManagedContent),
            "E" => Ok(Self::ExternallyReferenced),
            "R" => Ok(Self::Redirect),
            _ => Err(TypeError::UnknownVariant {
                kind: "control group",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ControlGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_codes_roundtrip() {
        for state in [ObjectState::Active, ObjectState::Inactive, ObjectState::Deleted] {
            assert_eq!(state.code().parse::<ObjectState>().unwrap(), state);
        }
        assert_eq!("Deleted".parse::<DatastreamState>().unwrap(), DatastreamState::Deleted);
        assert!("X".parse::<ObjectState>().is_err());
    }

    #[test]
    fn control_group_codes() {
        assert_eq!("M".parse::<ControlGroup>().unwrap(), ControlGroup::ManagedContent);
        assert!("Q".parse::<ControlGroup>().is_err());
        assert!(ControlGroup::InlineXml.is_by_value());
        assert!(!ControlGroup::Redirect.is_by_value());
    }
}
