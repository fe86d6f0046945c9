//! Shared types for the Tome wiki platform.
//!
//! This crate provides the enums used across all Tome crates: the page-level
//! read gate ([`Visibility`]) and write gate ([`EditPolicy`]). No crate in
//! the workspace depends on anything *except* `tome-types` for cross-cutting
//! type definitions, which keeps the dependency graph acyclic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Page-level read gate.
///
/// A `public` page is readable by everyone, including anonymous viewers.
/// A `private` page is readable only by its owner and by users on its
/// allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    /// Returns the stable string form stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

impl FromStr for Visibility {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            other => Err(ParseError::Visibility(other.to_string())),
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Page-level write gate, independent of [`Visibility`].
///
/// The owner may always edit; `all_authenticated` additionally lets any
/// logged-in user who can *read* the page edit its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditPolicy {
    OwnerOnly,
    AllAuthenticated,
}

impl EditPolicy {
    /// Returns the stable string form stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OwnerOnly => "owner_only",
            Self::AllAuthenticated => "all_authenticated",
        }
    }
}

impl FromStr for EditPolicy {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner_only" => Ok(Self::OwnerOnly),
            "all_authenticated" => Ok(Self::AllAuthenticated),
            other => Err(ParseError::EditPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for EditPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced when parsing stored enum values.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unknown visibility value: {0}")]
    Visibility(String),
    #[error("unknown edit policy value: {0}")]
    EditPolicy(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_round_trips_through_str() {
        for v in [Visibility::Public, Visibility::Private] {
            assert_eq!(v.as_str().parse::<Visibility>().unwrap(), v);
        }
        assert!("restricted".parse::<Visibility>().is_err());
    }

    #[test]
    fn edit_policy_round_trips_through_str() {
        for p in [EditPolicy::OwnerOnly, EditPolicy::AllAuthenticated] {
            assert_eq!(p.as_str().parse::<EditPolicy>().unwrap(), p);
        }
        assert!("admins".parse::<EditPolicy>().is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&Visibility::Public).unwrap(),
            "\"public\""
        );
        assert_eq!(
            serde_json::to_string(&EditPolicy::AllAuthenticated).unwrap(),
            "\"all_authenticated\""
        );
        let p: EditPolicy = serde_json::from_str("\"owner_only\"").unwrap();
        assert_eq!(p, EditPolicy::OwnerOnly);
    }
}
