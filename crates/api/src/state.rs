use std::sync::Arc;

use viewguard_core::registry::{LockArbiter, Registry};
use viewguard_core::store::PresenceStore;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Shared presence store.
    pub store: Arc<dyn PresenceStore>,
    pub registry: Registry,
    pub arbiter: LockArbiter,
    pub config: Arc<ServerConfig>,
    /// Render-channel connection manager.
    pub ws_manager: Arc<WsManager>,
}

impl AppState {
    /// Build the registry and arbiter over `store` using the configured poll interval.
    pub fn new(store: Arc<dyn PresenceStore>, config: ServerConfig, ws_manager: Arc<WsManager>) -> Self {
        let poll_interval_secs = config.presence.poll_interval_secs;
        Self {
            registry: Registry::new(Arc::clone(&store), poll_interval_secs),
            arbiter: LockArbiter::new(Arc::clone(&store), poll_interval_secs),
            store,
            config: Arc::new(config),
            ws_manager,
        }
    }
}
