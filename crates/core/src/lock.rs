//! Explicit control transfer and lock ownership state.
//!
//! Control is a flag on one viewer entry. Refresh keeps it self-healing;
//! this module handles the explicit "take control" request.

use crate::presence::{Principal, PresenceSet};
use crate::types::PrincipalId;

// ---------------------------------------------------------------------------
// Ownership state
// ---------------------------------------------------------------------------

/// Who holds write control on a lockable identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOwnership {
    Unowned,
    OwnedBy {
        id: Option<PrincipalId>,
        guard: String,
        name: String,
    },
}

impl LockOwnership {
    /// Read the ownership state off a stored set.
    ///
    /// A controller whose entry has expired still counts as the owner until
    /// the next refresh evicts it.
    pub fn of(set: &PresenceSet) -> Self {
        match set.controller() {
            Some(entry) => LockOwnership::OwnedBy {
                id: entry.id.clone(),
                guard: entry.guard.clone(),
                name: entry.name.clone(),
            },
            None => LockOwnership::Unowned,
        }
    }

    pub fn is_owned_by(&self, principal: &Principal) -> bool {
        match self {
            LockOwnership::OwnedBy { id, guard, .. } => {
                *id == principal.id && *guard == principal.guard
            }
            LockOwnership::Unowned => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Take control
// ---------------------------------------------------------------------------

/// Result of a take-control request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TakeControlOutcome {
    pub set: PresenceSet,
    /// The principal had an entry in the set and now holds control.
    pub granted: bool,
    /// Ownership before the request was applied.
    pub previous: LockOwnership,
}

/// Hand control to `principal` and demote every other entry.
///
/// When the principal is not present no entry ends up with control; the
/// next refresh re-homes it. Applying the same request twice is a no-op.
pub fn apply_take_control(mut set: PresenceSet, principal: &Principal) -> TakeControlOutcome {
    let previous = LockOwnership::of(&set);
    let mut granted = false;
    for entry in set.entries_mut() {
        entry.has_control = entry.belongs_to(principal);
        granted |= entry.has_control;
    }
    TakeControlOutcome {
        set,
        granted,
        previous,
    }
}
