#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use viewguard_api::auth::jwt::{generate_access_token, JwtConfig};
use viewguard_api::config::{ServerConfig, StoreBackend};
use viewguard_api::router::build_app_router;
use viewguard_api::state::AppState;
use viewguard_api::ws::WsManager;
use viewguard_core::config::PresenceConfig;
use viewguard_core::store::{MemoryStore, PresenceStore};

/// Build a test `ServerConfig` with `post` as the only lockable type.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "integration-test-secret-long-enough".to_string(),
            access_token_expiry_mins: 15,
        },
        presence: PresenceConfig {
            lockable_types: vec!["post".to_string()],
            ..PresenceConfig::default()
        },
        store: StoreBackend::Memory,
        sweep_interval_secs: 300,
    }
}

/// Build the full application router over a fresh in-memory store.
pub fn build_test_app() -> Router {
    build_test_app_with_store(Arc::new(MemoryStore::new()))
}

/// Build the full application router over the given store.
///
/// Clones of the returned router share the store, so consecutive requests
/// see each other's presence.
pub fn build_test_app_with_store(store: Arc<dyn PresenceStore>) -> Router {
    let state = AppState::new(store, test_config(), Arc::new(WsManager::new()));
    build_app_router(state)
}

/// Issue a token for a principal of the default guard.
pub fn token(sub: &str, name: &str, role: &str) -> String {
    token_for_guard(sub, None, name, role)
}

pub fn token_for_guard(sub: &str, guard: Option<&str>, name: &str, role: &str) -> String {
    generate_access_token(sub, guard, name, role, &test_config().jwt)
        .expect("token generation should succeed")
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
