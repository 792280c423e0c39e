//! Display-facing projection of a presence set for one caller.
//!
//! The projection also drives the write gate, so it lives next to the
//! merge rules rather than in the HTTP layer.

use std::fmt;

use serde::Serialize;

use crate::identifier::Identifier;
use crate::presence::{Principal, PresenceSet, ViewerEntry};

// ---------------------------------------------------------------------------
// Viewer summary
// ---------------------------------------------------------------------------

/// Tiered summary of the other viewers: two are named, the rest counted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum ViewerSummary {
    Nobody,
    One { name: String },
    Two { first: String, second: String },
    Many { first: String, second: String, more: usize },
}

impl ViewerSummary {
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        match names {
            [] => ViewerSummary::Nobody,
            [only] => ViewerSummary::One {
                name: only.as_ref().to_string(),
            },
            [first, second] => ViewerSummary::Two {
                first: first.as_ref().to_string(),
                second: second.as_ref().to_string(),
            },
            [first, second, rest @ ..] => ViewerSummary::Many {
                first: first.as_ref().to_string(),
                second: second.as_ref().to_string(),
                more: rest.len(),
            },
        }
    }

    /// Banner text, or `None` when nobody else is present.
    pub fn text(&self) -> Option<String> {
        match self {
            ViewerSummary::Nobody => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for ViewerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewerSummary::Nobody => Ok(()),
            ViewerSummary::One { name } => write!(f, "{name}"),
            ViewerSummary::Two { first, second } => write!(f, "{first} & {second}"),
            ViewerSummary::Many { first, second, more } => {
                write!(f, "{first}, {second} and {more} more")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// What a caller needs to render presence and gate editing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenceSnapshot {
    pub identifier: Identifier,
    /// Entries of the caller's guard, excluding the caller.
    pub others: Vec<ViewerEntry>,
    pub summary: ViewerSummary,
    pub display_text: Option<String>,
    pub show_banner: bool,
    pub lockable: bool,
    pub is_controller: bool,
    /// Passed through from the host's authorization layer.
    pub can_take_control: bool,
    /// Whether the caller may write. Fails closed on lockable resources.
    pub can_write: bool,
    /// The store could not be reached; presence is unknown.
    pub degraded: bool,
}

impl PresenceSnapshot {
    pub fn project(
        identifier: Identifier,
        set: &PresenceSet,
        principal: &Principal,
        lockable: bool,
        can_take_control: bool,
    ) -> Self {
        let others: Vec<ViewerEntry> = set
            .entries()
            .iter()
            .filter(|e| e.guard == principal.guard && !e.belongs_to(principal))
            .cloned()
            .collect();
        let names: Vec<&str> = others.iter().map(|e| e.name.as_str()).collect();
        let summary = ViewerSummary::from_names(&names);

        let is_controller = lockable
            && set
                .entries()
                .iter()
                .any(|e| e.belongs_to(principal) && e.has_control);

        Self {
            identifier,
            display_text: summary.text(),
            show_banner: !others.is_empty(),
            others,
            summary,
            lockable,
            is_controller,
            can_take_control,
            can_write: write_allowed(lockable, Some(is_controller)),
            degraded: false,
        }
    }

    /// Snapshot used when the store is unavailable: nobody else is shown and
    /// a lockable resource denies writes.
    pub fn degraded(identifier: Identifier, lockable: bool, can_take_control: bool) -> Self {
        Self {
            identifier,
            others: Vec::new(),
            summary: ViewerSummary::Nobody,
            display_text: None,
            show_banner: false,
            lockable,
            is_controller: false,
            can_take_control,
            can_write: write_allowed(lockable, None),
            degraded: true,
        }
    }
}

/// Write gate for the editing subsystem.
///
/// `is_controller` is `None` when control could not be determined.
pub fn write_allowed(lockable: bool, is_controller: Option<bool>) -> bool {
    match (lockable, is_controller) {
        (false, _) => true,
        (true, Some(is_controller)) => is_controller,
        (true, None) => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
