use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use viewguard_core::identifier::Identifier;
use viewguard_core::presence::Principal;

use crate::error::AppResult;
use crate::handlers::presence::PresenceRequest;
use crate::middleware::auth::Viewer;
use crate::state::AppState;
use crate::ws::manager::WsManager;

/// GET /api/v1/presence/ws?resource_type=..&resource_key=..
///
/// Upgrades to a WebSocket subscribed to one identifier. The identifier is
/// validated before the upgrade so a bad request gets a JSON 400.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    viewer: Viewer,
    Query(params): Query<PresenceRequest>,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let identifier = params.identifier()?;
    Ok(ws.on_upgrade(move |socket| {
        handle_socket(socket, state.ws_manager, identifier, viewer.principal)
    }))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Drains inbound messages until the client goes away.
///   4. Cleans up on disconnect.
async fn handle_socket(
    socket: WebSocket,
    ws_manager: Arc<WsManager>,
    identifier: Identifier,
    principal: Principal,
) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, identifier = %identifier, "WebSocket connected");

    let mut rx = ws_manager
        .add(conn_id.clone(), identifier.clone(), &principal)
        .await;

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    // The channel is push-only; inbound frames other than Close are ignored.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, identifier = %identifier, "WebSocket disconnected");
}
