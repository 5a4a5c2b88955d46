//! HTTP router and handlers

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::State,
    middleware,
    response::IntoResponse,
    routing::get,
};
use serde_json::json;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use super::auth::{RequestAuthenticator, auth_middleware};
use crate::mtls::identity::VerifiedIdentity;

/// Shared application state
pub struct AppState {
    /// Request-layer authenticator
    pub authenticator: Arc<RequestAuthenticator>,
    /// Process start, for uptime reporting
    pub started: Instant,
}

impl AppState {
    /// State with the clock started now.
    #[must_use]
    pub fn new(authenticator: Arc<RequestAuthenticator>) -> Self {
        Self {
            authenticator,
            started: Instant::now(),
        }
    }
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    let authenticator = Arc::clone(&state.authenticator);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/identity", get(identity_handler))
        // Authentication middleware (applied before other layers)
        .layer(middleware::from_fn_with_state(authenticator, auth_middleware))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness check (GET /health). Public; reveals nothing about trust config.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "ready": true,
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started.elapsed().as_secs(),
    }))
}

/// Echo the caller's identity (GET /api/identity)
async fn identity_handler(identity: VerifiedIdentity) -> impl IntoResponse {
    Json(identity)
}
