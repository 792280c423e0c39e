//! [`PresenceStore`] over the `presence_cache` table.
//!
//! Each key holds one opaque value with an absolute expiry computed by the
//! database clock, so every API process agrees on when a value dies.
//! Writes are plain upserts: concurrent writers are last-write-wins.

use std::time::Duration;

use async_trait::async_trait;
use viewguard_core::store::{PresenceStore, StoreError};

use crate::DbPool;

/// Shared presence store backed by Postgres.
#[derive(Clone)]
pub struct PgPresenceStore {
    pool: DbPool,
}

impl PgPresenceStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn unavailable(err: sqlx::Error) -> StoreError {
    tracing::error!(error = %err, "Presence store query failed");
    StoreError::Unavailable(err.to_string())
}

#[async_trait]
impl PresenceStore for PgPresenceStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        sqlx::query_scalar::<_, String>(
            "SELECT value FROM presence_cache WHERE key = $1 AND expires_at > NOW()",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO presence_cache (key, value, expires_at) \
             VALUES ($1, $2, NOW() + make_interval(secs => $3)) \
             ON CONFLICT (key) DO UPDATE \
             SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at, updated_at = NOW()",
        )
        .bind(key)
        .bind(value)
        .bind(ttl.as_secs_f64())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM presence_cache WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await.map_err(unavailable)
    }
}
