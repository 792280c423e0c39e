//! Viewer entries, presence sets, and the refresh merge rules.
//!
//! A presence set is stored as a single value per identifier. Every refresh
//! reads the whole set, evicts stale entries, re-inserts the caller, heals
//! the controller flag when the resource is lockable, and writes the whole
//! set back. There is no sub-key mutation and no cross-client mutual
//! exclusion: concurrent refreshes are last-write-wins.
//!
//! Guards never share presence data: a refresh drops every entry of another
//! guard before writing the set back, so a stored set only ever holds the
//! guard of its last writer.

use serde::{Deserialize, Serialize};

use crate::types::{PrincipalId, Timestamp};

// ---------------------------------------------------------------------------
// TTL policy
// ---------------------------------------------------------------------------

/// Lower bound for an entry's lifetime, regardless of the poll interval.
pub const MIN_ENTRY_TTL_SECS: u64 = 5;

/// Lifetime of a viewer entry (and of the stored set) for a poll interval.
///
/// An entry survives two missed polls before it is considered stale.
pub fn entry_ttl_secs(poll_interval_secs: u64) -> u64 {
    poll_interval_secs.saturating_mul(2).max(MIN_ENTRY_TTL_SECS)
}

/// `now + ttl_secs`, saturating at the latest representable instant.
fn expiry_after(now: Timestamp, ttl_secs: u64) -> Timestamp {
    i64::try_from(ttl_secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC)
}

// ---------------------------------------------------------------------------
// Principal
// ---------------------------------------------------------------------------

/// The identity of a caller, scoped to an authentication guard.
///
/// `id` is `None` for anonymous viewers. Anonymous viewers of the same guard
/// share one `(None, guard)` key and therefore merge into one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Option<PrincipalId>,
    pub guard: String,
    pub name: String,
}

impl Principal {
    pub fn new(id: impl Into<PrincipalId>, guard: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            guard: guard.into(),
            name: name.into(),
        }
    }

    pub fn anonymous(guard: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            guard: guard.into(),
            name: name.into(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.id.is_none()
    }
}

// ---------------------------------------------------------------------------
// ViewerEntry
// ---------------------------------------------------------------------------

/// One principal currently present on an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerEntry {
    pub id: Option<PrincipalId>,
    pub guard: String,
    /// Resolved when the entry is inserted and never re-resolved.
    pub name: String,
    pub expires_at: Timestamp,
    #[serde(default)]
    pub has_control: bool,
}

impl ViewerEntry {
    /// Build a fresh entry for `principal` that expires `ttl_secs` after `now`.
    pub fn for_principal(principal: &Principal, now: Timestamp, ttl_secs: u64, has_control: bool) -> Self {
        Self {
            id: principal.id.clone(),
            guard: principal.guard.clone(),
            name: principal.name.clone(),
            expires_at: expiry_after(now, ttl_secs),
            has_control,
        }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// `true` when this entry has the same `(id, guard)` pair as `principal`.
    pub fn belongs_to(&self, principal: &Principal) -> bool {
        self.id == principal.id && self.guard == principal.guard
    }
}

// ---------------------------------------------------------------------------
// PresenceSet
// ---------------------------------------------------------------------------

/// Everything stored under one identifier.
///
/// The collection has no ordering guarantee across refreshes. Within a single
/// refresh the order is stable, which is what the controller tie-break uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresenceSet {
    entries: Vec<ViewerEntry>,
}

impl PresenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<ViewerEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ViewerEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [ViewerEntry] {
        &mut self.entries
    }

    pub fn into_entries(self) -> Vec<ViewerEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry belonging to `principal`, if present.
    pub fn entry_for(&self, principal: &Principal) -> Option<&ViewerEntry> {
        self.entries.iter().find(|e| e.belongs_to(principal))
    }

    /// The first entry holding control, if any.
    pub fn controller(&self) -> Option<&ViewerEntry> {
        self.entries.iter().find(|e| e.has_control)
    }

    pub fn controller_count(&self) -> usize {
        self.entries.iter().filter(|e| e.has_control).count()
    }

    /// Encode for the store. The encoding is not a compatibility surface.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

// ---------------------------------------------------------------------------
// Refresh merge
// ---------------------------------------------------------------------------

/// Result of merging a caller into a presence set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// The set to persist.
    pub set: PresenceSet,
    /// Control was handed to the caller by the self-healing reassignment.
    /// The caller's UI must re-render immediately instead of waiting a poll.
    pub control_granted_to_caller: bool,
}

/// Merge `principal` into `current` as of `now`.
///
/// - Entries from another guard are dropped.
/// - Entries with `now >= expires_at` are dropped.
/// - The caller's own live entry is replaced in its old slot, keeping its
///   control flag. A new caller is appended.
/// - A caller arriving at an empty set gets control when `lockable`.
/// - When `lockable` and nobody holds control, the first entry gets it.
/// - Any surplus controllers are demoted so at most one remains.
pub fn apply_refresh(
    current: PresenceSet,
    principal: &Principal,
    now: Timestamp,
    poll_interval_secs: u64,
    lockable: bool,
) -> RefreshOutcome {
    let mut survivors: Vec<ViewerEntry> = Vec::with_capacity(current.len() + 1);
    let mut preserved_control = false;
    let mut self_slot: Option<usize> = None;

    for entry in current.into_entries() {
        if entry.guard != principal.guard || entry.is_expired(now) {
            continue;
        }
        if entry.belongs_to(principal) {
            preserved_control |= entry.has_control;
            if self_slot.is_none() {
                self_slot = Some(survivors.len());
            }
            continue;
        }
        survivors.push(entry);
    }

    let was_empty = survivors.is_empty();
    let has_control = lockable && (preserved_control || was_empty);
    let own = ViewerEntry::for_principal(principal, now, entry_ttl_secs(poll_interval_secs), has_control);
    match self_slot {
        Some(slot) => survivors.insert(slot, own),
        None => survivors.push(own),
    }

    let mut control_granted_to_caller = false;
    if lockable {
        if !survivors.iter().any(|e| e.has_control) {
            // Survivors always holds at least the caller here.
            let first = &mut survivors[0];
            first.has_control = true;
            control_granted_to_caller = first.belongs_to(principal);
        }
        demote_surplus_controllers(&mut survivors);
    } else {
        for entry in &mut survivors {
            entry.has_control = false;
        }
    }

    RefreshOutcome {
        set: PresenceSet::from_entries(survivors),
        control_granted_to_caller,
    }
}

/// Keep the first controller in collection order, demote the rest.
fn demote_surplus_controllers(entries: &mut [ViewerEntry]) {
    let mut seen = false;
    for entry in entries.iter_mut().filter(|e| e.has_control) {
        if seen {
            entry.has_control = false;
        }
        seen = true;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    pub(crate) fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    pub(crate) fn web(id: &str, name: &str) -> Principal {
        Principal::new(id, "web", name)
    }

    pub(crate) fn entry(id: &str, guard: &str, expires_in_secs: i64, has_control: bool) -> ViewerEntry {
        ViewerEntry {
            id: Some(id.to_string()),
            guard: guard.to_string(),
            name: id.to_uppercase(),
            expires_at: t0() + chrono::Duration::seconds(expires_in_secs),
            has_control,
        }
    }

    // -----------------------------------------------------------------------
    // TTL policy
    // -----------------------------------------------------------------------

    #[test]
    fn test_entry_ttl_doubles_poll_interval() {
        assert_eq!(entry_ttl_secs(10), 20);
        assert_eq!(entry_ttl_secs(3), 6);
    }

    #[test]
    fn test_entry_ttl_has_floor() {
        assert_eq!(entry_ttl_secs(0), MIN_ENTRY_TTL_SECS);
        assert_eq!(entry_ttl_secs(1), MIN_ENTRY_TTL_SECS);
        assert_eq!(entry_ttl_secs(2), MIN_ENTRY_TTL_SECS);
    }

    // -----------------------------------------------------------------------
    // Merge
    // -----------------------------------------------------------------------

    #[test]
    fn test_refresh_twice_keeps_single_entry() {
        let a = web("1", "Ada");
        let first = apply_refresh(PresenceSet::new(), &a, t0(), 10, false);
        let second = apply_refresh(first.set, &a, t0() + chrono::Duration::seconds(1), 10, false);

        assert_eq!(second.set.len(), 1);
        assert_eq!(
            second.set.entries()[0].expires_at,
            t0() + chrono::Duration::seconds(21)
        );
    }

    #[test]
    fn test_expired_entry_is_dropped() {
        let current = PresenceSet::from_entries(vec![entry("2", "web", 0, false)]);
        let out = apply_refresh(current, &web("1", "Ada"), t0(), 10, false);

        assert_eq!(out.set.len(), 1);
        assert!(out.set.entry_for(&web("2", "")).is_none());
    }

    #[test]
    fn test_entry_expiring_in_future_survives() {
        let current = PresenceSet::from_entries(vec![entry("2", "web", 1, false)]);
        let out = apply_refresh(current, &web("1", "Ada"), t0(), 10, false);
        assert_eq!(out.set.len(), 2);
    }

    #[test]
    fn test_other_guard_entries_are_dropped() {
        let current = PresenceSet::from_entries(vec![
            entry("1", "admin", 60, true),
            entry("2", "admin", 60, false),
        ]);
        let a = web("1", "Ada");
        let out = apply_refresh(current, &a, t0(), 10, true);

        assert_eq!(out.set.len(), 1);
        assert!(out.set.entries().iter().all(|e| e.guard == "web"));
        // The admin controller does not count: the web caller arrives at an empty set.
        assert!(out.set.entry_for(&a).unwrap().has_control);
        assert_eq!(out.set.controller_count(), 1);
    }

    #[test]
    fn test_same_id_in_other_guard_is_not_the_caller() {
        let current = PresenceSet::from_entries(vec![
            entry("1", "admin", 60, true),
            entry("2", "web", 60, true),
        ]);
        let a = web("1", "Ada");
        let out = apply_refresh(current, &a, t0(), 10, true);

        // `admin:1` holding control is not preserved for `web:1`.
        assert!(!out.set.entry_for(&a).unwrap().has_control);
        assert!(out.set.entry_for(&web("2", "")).unwrap().has_control);
    }

    #[test]
    fn test_name_is_taken_from_caller_on_reinsert() {
        let current = PresenceSet::from_entries(vec![entry("1", "web", 60, false)]);
        let out = apply_refresh(current, &web("1", "Ada Lovelace"), t0(), 10, false);
        assert_eq!(out.set.entries()[0].name, "Ada Lovelace");
    }

    #[test]
    fn test_anonymous_viewers_merge_per_guard() {
        let anon = Principal::anonymous("web", "Guest");
        let first = apply_refresh(PresenceSet::new(), &anon, t0(), 10, false);
        let second = apply_refresh(first.set, &anon, t0(), 10, false);

        assert_eq!(second.set.len(), 1);
        assert!(second.set.entries()[0].id.is_none());
    }

    #[test]
    fn test_non_lockable_never_grants_control() {
        let current = PresenceSet::from_entries(vec![entry("2", "web", 60, true)]);
        let out = apply_refresh(current, &web("1", "Ada"), t0(), 10, false);

        assert_eq!(out.set.controller_count(), 0);
        assert!(!out.control_granted_to_caller);
    }

    // -----------------------------------------------------------------------
    // Control
    // -----------------------------------------------------------------------

    #[test]
    fn test_first_viewer_gets_control() {
        let a = web("1", "Ada");
        let out = apply_refresh(PresenceSet::new(), &a, t0(), 10, true);

        assert!(out.set.entry_for(&a).unwrap().has_control);
        // The first-viewer grant is not a change the caller must be told about.
        assert!(!out.control_granted_to_caller);
    }

    #[test]
    fn test_second_viewer_does_not_get_control() {
        let a = web("1", "Ada");
        let b = web("2", "Bob");
        let first = apply_refresh(PresenceSet::new(), &a, t0(), 10, true);
        let second = apply_refresh(first.set, &b, t0(), 10, true);

        assert!(second.set.entry_for(&a).unwrap().has_control);
        assert!(!second.set.entry_for(&b).unwrap().has_control);
        assert_eq!(second.set.controller_count(), 1);
    }

    #[test]
    fn test_returning_controller_keeps_control() {
        let current = PresenceSet::from_entries(vec![
            entry("2", "web", 60, false),
            entry("1", "web", 60, true),
        ]);
        let a = web("1", "Ada");
        let out = apply_refresh(current, &a, t0(), 10, true);

        assert!(out.set.entry_for(&a).unwrap().has_control);
        assert_eq!(out.set.controller_count(), 1);
    }

    #[test]
    fn test_expired_controller_is_replaced_when_survivor_refreshes() {
        let current = PresenceSet::from_entries(vec![
            entry("a", "web", -1, true),
            entry("b", "web", 60, false),
        ]);
        let b = web("b", "Bob");
        let out = apply_refresh(current, &b, t0(), 10, true);

        assert_eq!(out.set.len(), 1);
        assert!(out.set.entry_for(&b).unwrap().has_control);
    }

    #[test]
    fn test_expired_controller_refreshing_hands_control_to_survivor() {
        let current = PresenceSet::from_entries(vec![
            entry("a", "web", -1, true),
            entry("b", "web", 60, false),
        ]);
        let a = web("a", "Ada");
        let out = apply_refresh(current, &a, t0(), 10, true);

        assert_eq!(out.set.len(), 2);
        assert!(out.set.entry_for(&web("b", "")).unwrap().has_control);
        assert!(!out.set.entry_for(&a).unwrap().has_control);
        assert!(!out.control_granted_to_caller);
    }

    #[test]
    fn test_self_healing_grant_to_caller_raises_signal() {
        // Caller is the oldest viewer; the controller behind it went stale.
        let current = PresenceSet::from_entries(vec![
            entry("a", "web", 60, false),
            entry("b", "web", 60, false),
            entry("c", "web", -5, true),
        ]);
        let a = web("a", "Ada");
        let out = apply_refresh(current, &a, t0(), 10, true);

        assert!(out.set.entry_for(&a).unwrap().has_control);
        assert!(out.control_granted_to_caller);
        assert_eq!(out.set.controller_count(), 1);
    }

    #[test]
    fn test_surplus_controllers_are_demoted() {
        let current = PresenceSet::from_entries(vec![
            entry("a", "web", 60, true),
            entry("b", "web", 60, true),
        ]);
        let out = apply_refresh(current, &web("c", "Cy"), t0(), 10, true);

        assert_eq!(out.set.controller_count(), 1);
        assert!(out.set.entries()[0].has_control);
    }

    #[test]
    fn test_caller_without_entry_is_appended() {
        let current = PresenceSet::from_entries(vec![
            entry("a", "web", 60, true),
            entry("b", "web", 60, false),
        ]);
        let out = apply_refresh(current, &web("c", "Cy"), t0(), 10, true);

        let ids: Vec<_> = out.set.entries().iter().map(|e| e.id.as_deref()).collect();
        assert_eq!(ids, [Some("a"), Some("b"), Some("c")]);
    }

    #[test]
    fn test_huge_ttl_saturates_instead_of_panicking() {
        let a = web("a", "Ada");
        let out = apply_refresh(PresenceSet::new(), &a, t0(), u64::MAX, true);
        assert_eq!(
            out.set.entry_for(&a).unwrap().expires_at,
            chrono::DateTime::<Utc>::MAX_UTC
        );

        let entry = ViewerEntry::for_principal(&a, t0(), i64::MAX as u64, false);
        assert_eq!(entry.expires_at, chrono::DateTime::<Utc>::MAX_UTC);
        assert!(!entry.is_expired(t0()));
    }

    #[test]
    fn test_single_controller_across_guards() {
        let viewers = [
            web("a", "A"),
            Principal::new("a", "admin", "A (admin)"),
            web("b", "B"),
        ];
        let mut set = PresenceSet::new();
        for (step, who) in viewers.iter().cycle().take(12).enumerate() {
            let now = t0() + chrono::Duration::seconds(step as i64);
            set = apply_refresh(set, who, now, 10, true).set;
            assert!(set.controller_count() <= 1, "step {step}");
            assert!(set.entries().iter().all(|e| e.guard == who.guard));
        }
    }

    #[test]
    fn test_single_controller_over_many_refreshes() {
        let viewers = [web("a", "A"), web("b", "B"), web("c", "C")];
        let mut set = PresenceSet::new();
        for step in 0..30i64 {
            let who = &viewers[(step as usize * 7) % viewers.len()];
            let now = t0() + chrono::Duration::seconds(step * 4);
            set = apply_refresh(set, who, now, 5, true).set;
            assert_eq!(set.controller_count(), 1, "step {step}");
        }
    }

    // -----------------------------------------------------------------------
    // Codec
    // -----------------------------------------------------------------------

    #[test]
    fn test_decode_tolerates_missing_control_flag() {
        let raw = r#"[{"id":"1","guard":"web","name":"Ada","expires_at":"2026-03-01T12:00:00Z"}]"#;
        let set = PresenceSet::decode(raw).unwrap();
        assert_eq!(set.len(), 1);
        assert!(!set.entries()[0].has_control);
    }
}
