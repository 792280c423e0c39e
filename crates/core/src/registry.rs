//! Store-backed Registry and Lock Arbiter.
//!
//! Both operate on the whole presence set of one identifier: read it,
//! apply the pure rules from [`crate::presence`] / [`crate::lock`], write it
//! back. Store failures fail the current operation only; nothing partial is
//! persisted and the next poll starts over from a fresh read.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::identifier::Identifier;
use crate::lock::{apply_take_control, TakeControlOutcome};
use crate::presence::{apply_refresh, entry_ttl_secs, Principal, PresenceSet};
use crate::store::{PresenceStore, StoreError};
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Render trigger
// ---------------------------------------------------------------------------

/// Observer told when the calling principal's own control state changed
/// during an operation, so its UI can re-render outside the poll cycle.
pub trait RenderTrigger: Send + Sync {
    fn control_changed(&self, identifier: &Identifier, principal: &Principal, has_control: bool);
}

impl<F> RenderTrigger for F
where
    F: Fn(&Identifier, &Principal, bool) + Send + Sync,
{
    fn control_changed(&self, identifier: &Identifier, principal: &Principal, has_control: bool) {
        self(identifier, principal, has_control)
    }
}

/// A trigger that ignores every signal.
pub struct NoRender;

impl RenderTrigger for NoRender {
    fn control_changed(&self, _: &Identifier, _: &Principal, _: bool) {}
}

// ---------------------------------------------------------------------------
// Shared load/save
// ---------------------------------------------------------------------------

/// Read the set stored for `identifier`. Absent and undecodable values both
/// read as an empty set; the next write replaces them.
async fn load(store: &dyn PresenceStore, identifier: &Identifier) -> Result<PresenceSet, StoreError> {
    let Some(raw) = store.get(&identifier.store_key()).await? else {
        return Ok(PresenceSet::new());
    };
    match PresenceSet::decode(&raw) {
        Ok(set) => Ok(set),
        Err(e) => {
            tracing::warn!(
                identifier = %identifier,
                error = %e,
                "Discarding undecodable presence set"
            );
            Ok(PresenceSet::new())
        }
    }
}

async fn save(
    store: &dyn PresenceStore,
    identifier: &Identifier,
    set: &PresenceSet,
    poll_interval_secs: u64,
) -> Result<(), StoreError> {
    let raw = set.encode()?;
    let ttl = Duration::from_secs(entry_ttl_secs(poll_interval_secs));
    store.put(&identifier.store_key(), raw, ttl).await
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Tracks who is present on each identifier.
#[derive(Clone)]
pub struct Registry {
    store: Arc<dyn PresenceStore>,
    poll_interval_secs: u64,
}

impl Registry {
    pub fn new(store: Arc<dyn PresenceStore>, poll_interval_secs: u64) -> Self {
        Self {
            store,
            poll_interval_secs,
        }
    }

    pub fn poll_interval_secs(&self) -> u64 {
        self.poll_interval_secs
    }

    /// Read the stored set without modifying it.
    pub async fn fetch(&self, identifier: &Identifier) -> Result<PresenceSet, StoreError> {
        load(self.store.as_ref(), identifier).await
    }

    /// Register `principal` as present on `identifier` and return the set
    /// that was written back.
    pub async fn refresh(
        &self,
        identifier: &Identifier,
        principal: &Principal,
        lockable: bool,
        trigger: &dyn RenderTrigger,
    ) -> Result<PresenceSet, StoreError> {
        self.refresh_at(identifier, principal, lockable, trigger, Utc::now())
            .await
    }

    /// [`Registry::refresh`] with an explicit clock reading.
    pub async fn refresh_at(
        &self,
        identifier: &Identifier,
        principal: &Principal,
        lockable: bool,
        trigger: &dyn RenderTrigger,
        now: Timestamp,
    ) -> Result<PresenceSet, StoreError> {
        let current = load(self.store.as_ref(), identifier).await?;
        let outcome = apply_refresh(current, principal, now, self.poll_interval_secs, lockable);
        save(self.store.as_ref(), identifier, &outcome.set, self.poll_interval_secs).await?;

        tracing::debug!(
            identifier = %identifier,
            guard = %principal.guard,
            viewers = outcome.set.len(),
            "Presence refreshed"
        );

        if outcome.control_granted_to_caller {
            tracing::info!(
                identifier = %identifier,
                guard = %principal.guard,
                principal_id = ?principal.id,
                "Control reassigned to refreshing viewer"
            );
            trigger.control_changed(identifier, principal, true);
        }

        Ok(outcome.set)
    }
}

// ---------------------------------------------------------------------------
// LockArbiter
// ---------------------------------------------------------------------------

/// Processes explicit take-control requests on lockable identifiers.
#[derive(Clone)]
pub struct LockArbiter {
    store: Arc<dyn PresenceStore>,
    poll_interval_secs: u64,
}

impl LockArbiter {
    pub fn new(store: Arc<dyn PresenceStore>, poll_interval_secs: u64) -> Self {
        Self {
            store,
            poll_interval_secs,
        }
    }

    /// Whether `principal` currently holds control of `identifier`.
    ///
    /// Read-only: the stored set is not merged or written back. An absent set
    /// or an expired entry means no control.
    pub async fn has_control(
        &self,
        identifier: &Identifier,
        principal: &Principal,
    ) -> Result<bool, StoreError> {
        self.has_control_at(identifier, principal, Utc::now()).await
    }

    /// [`LockArbiter::has_control`] with an explicit clock reading.
    pub async fn has_control_at(
        &self,
        identifier: &Identifier,
        principal: &Principal,
        now: Timestamp,
    ) -> Result<bool, StoreError> {
        let set = load(self.store.as_ref(), identifier).await?;
        Ok(set
            .entry_for(principal)
            .is_some_and(|e| e.has_control && !e.is_expired(now)))
    }

    /// Give `principal` control of `identifier`, demoting everyone else.
    ///
    /// Persists immediately so the caller's next refresh observes the grant.
    pub async fn take_control(
        &self,
        identifier: &Identifier,
        principal: &Principal,
    ) -> Result<TakeControlOutcome, StoreError> {
        let current = load(self.store.as_ref(), identifier).await?;
        let outcome = apply_take_control(current, principal);
        save(self.store.as_ref(), identifier, &outcome.set, self.poll_interval_secs).await?;

        if outcome.granted {
            tracing::info!(
                identifier = %identifier,
                guard = %principal.guard,
                principal_id = ?principal.id,
                "Control taken"
            );
        } else {
            tracing::warn!(
                identifier = %identifier,
                guard = %principal.guard,
                principal_id = ?principal.id,
                "Take-control by a principal with no presence entry; control cleared"
            );
        }

        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
