//! The shared, time-expiring store that holds one presence set per key.
//!
//! Implementations only need atomic get/put of an opaque value per key.
//! There is no compare-and-swap: concurrent writers are last-write-wins.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Errors raised by a [`PresenceStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Stored value could not be encoded or decoded: {0}")]
    Codec(#[from] serde_json::Error),
}

/// A key/value store with per-key expiry, shared by all participants.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Fetch the value under `key`. Expired values read as `None`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Replace the value under `key`, expiring it after `ttl`.
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;

    /// Drop expired values. Returns how many were removed.
    async fn purge_expired(&self) -> Result<u64, StoreError>;

    /// Check the store is reachable.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

struct Slot {
    value: String,
    expires_at: Instant,
}

/// In-process store for single-node deployments and tests.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application.
#[derive(Default)]
pub struct MemoryStore {
    slots: RwLock<HashMap<String, Slot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys held, live or not yet purged.
    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }
}

#[async_trait]
impl PresenceStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        Ok(self
            .slots
            .read()
            .await
            .get(key)
            .filter(|slot| slot.expires_at > now)
            .map(|slot| slot.value.clone()))
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        let slot = Slot {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.slots.write().await.insert(key.to_string(), slot);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut slots = self.slots.write().await;
        let before = slots.len();
        slots.retain(|_, slot| slot.expires_at > now);
        Ok((before - slots.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_absent_key() {
        let store = MemoryStore::new();
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = MemoryStore::new();
        store.put("k", "a".into(), Duration::from_secs(10)).await.unwrap();
        store.put("k", "b".into(), Duration::from_secs(10)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("b"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_value_expires_after_ttl() {
        let store = MemoryStore::new();
        store.put("k", "v".into(), Duration::from_secs(10)).await.unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(store.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_rolls_ttl_forward() {
        let store = MemoryStore::new();
        store.put("k", "v".into(), Duration::from_secs(10)).await.unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;
        store.put("k", "v".into(), Duration::from_secs(10)).await.unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;

        assert!(store.get("k").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_removes_only_dead_keys() {
        let store = MemoryStore::new();
        store.put("short", "v".into(), Duration::from_secs(1)).await.unwrap();
        store.put("long", "v".into(), Duration::from_secs(60)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.len().await, 1);
        assert!(store.get("long").await.unwrap().is_some());
    }
}
