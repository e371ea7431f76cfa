//! HTTP/WebSocket gateway for the Intercom relay.
//!
//! The gateway owns no session logic: it upgrades sockets, feeds inbound
//! events to the coordinator, and drains the hub's outbound channel back
//! into each socket.

use axum::http::Method;
use axum::{routing::get, Json, Router};
use chrono::Utc;
use intercom_realtime::Coordinator;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

pub mod websocket;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
}

/// Build the gateway router: the websocket endpoint plus a health probe
pub fn build_router(coordinator: Arc<Coordinator>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(websocket::websocket_handler))
        .with_state(AppState { coordinator })
        .layer(cors)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}
