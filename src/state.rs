//! Requested configuration states.
//!
//! Every synthesis request targets one of four states, mirroring the usual
//! resource-module semantics: `merged` adds and updates, `deleted` removes,
//! `replaced` rewrites matched entries, `overridden` rewrites the whole
//! collection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The target state of a synthesis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    /// Add what is missing, update what differs, leave the rest alone.
    Merged,
    /// Remove the requested entries (or everything, when want is empty).
    Deleted,
    /// Rewrite the entries named in want; untouched entries survive.
    Replaced,
    /// Rewrite the entries named in want and remove everything else.
    Overridden,
}

impl State {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Merged => "merged",
            State::Deleted => "deleted",
            State::Replaced => "replaced",
            State::Overridden => "overridden",
        }
    }

    /// True for the removal state.
    pub fn is_deleted(&self) -> bool {
        matches!(self, State::Deleted)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for State {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "merged" => Ok(State::Merged),
            "deleted" => Ok(State::Deleted),
            "replaced" => Ok(State::Replaced),
            "overridden" => Ok(State::Overridden),
            _ => Err(Error::UnknownState(s.to_string())),
        }
    }
}
