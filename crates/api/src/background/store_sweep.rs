//! Periodic removal of expired values from the shared store.
//!
//! Housekeeping only: live presence sets are never touched, so controller
//! reassignment still happens exclusively inside a refresh.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use viewguard_core::store::PresenceStore;

/// Run the sweep loop until `cancel` is triggered.
pub async fn run(store: Arc<dyn PresenceStore>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "Store sweep started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Store sweep stopping");
                break;
            }
            _ = ticker.tick() => {
                match store.purge_expired().await {
                    Ok(purged) if purged > 0 => {
                        tracing::info!(purged, "Store sweep: purged expired values");
                    }
                    Ok(_) => tracing::debug!("Store sweep: nothing to purge"),
                    Err(e) => tracing::error!(error = %e, "Store sweep failed"),
                }
            }
        }
    }
}
