use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use tokio::sync::{mpsc, RwLock};
use viewguard_core::identifier::Identifier;
use viewguard_core::message::PresenceMessage;
use viewguard_core::presence::Principal;
use viewguard_core::types::{PrincipalId, Timestamp};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single render-channel connection.
pub struct WsConnection {
    /// Identifier the client is viewing.
    pub identifier: Identifier,
    pub principal_id: Option<PrincipalId>,
    pub guard: String,
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    /// When this connection was established.
    pub connected_at: Timestamp,
}

impl WsConnection {
    fn is_viewer(&self, identifier: &Identifier, principal: &Principal) -> bool {
        self.identifier == *identifier
            && self.principal_id == principal.id
            && self.guard == principal.guard
    }
}

/// Manages all active render-channel connections.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

impl WsManager {
    /// Create a new, empty connection manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection watching `identifier` on behalf of `principal`.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn add(
        &self,
        conn_id: String,
        identifier: Identifier,
        principal: &Principal,
    ) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            identifier,
            principal_id: principal.id.clone(),
            guard: principal.guard.clone(),
            sender: tx,
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    /// Remove a connection by its ID.
    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    /// Send a message to every connection of `guard` watching `identifier`.
    ///
    /// Returns the number of connections the message was sent to. Closed
    /// channels are skipped; their receive loops clean them up.
    pub async fn send_to_identifier(
        &self,
        identifier: &Identifier,
        guard: &str,
        message: &PresenceMessage,
    ) -> usize {
        let Some(frame) = encode(message) else {
            return 0;
        };
        let conns = self.connections.read().await;
        let mut count = 0;
        for conn in conns
            .values()
            .filter(|c| c.identifier == *identifier && c.guard == guard)
        {
            let _ = conn.sender.send(frame.clone());
            count += 1;
        }
        count
    }

    /// Send a message to the connections of one principal on `identifier`.
    pub async fn send_to_viewer(
        &self,
        identifier: &Identifier,
        principal: &Principal,
        message: &PresenceMessage,
    ) -> usize {
        let Some(frame) = encode(message) else {
            return 0;
        };
        let conns = self.connections.read().await;
        let mut count = 0;
        for conn in conns.values().filter(|c| c.is_viewer(identifier, principal)) {
            let _ = conn.sender.send(frame.clone());
            count += 1;
        }
        count
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the map.
    ///
    /// Used during graceful shutdown to notify all clients before the
    /// server stops accepting new connections.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}

fn encode(message: &PresenceMessage) -> Option<Message> {
    match message.to_json() {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode presence message");
            None
        }
    }
}
