//! Route definitions for presence and lock arbitration.
//!
//! Authentication is optional: requests without a token are anonymous viewers.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::presence;
use crate::state::AppState;
use crate::ws;

/// Presence routes mounted at `/presence`.
///
/// ```text
/// POST /refresh        -> refresh
/// POST /take-control   -> take_control
/// GET  /control        -> control
/// GET  /ws             -> ws_handler
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/refresh", post(presence::refresh))
        .route("/take-control", post(presence::take_control))
        .route("/control", get(presence::control))
        .route("/ws", get(ws::ws_handler))
}
