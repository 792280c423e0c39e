pub mod health;
pub mod presence;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /presence/refresh                 refresh presence (POST)
/// /presence/take-control            take write control (POST)
/// /presence/control                 read-only control check (GET)
/// /presence/ws                      render channel (WebSocket)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/presence", presence::router())
}
