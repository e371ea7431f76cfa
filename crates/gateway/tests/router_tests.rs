//! Router-level tests for the gateway surface.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use intercom_config::{DatabaseConfig, RealtimeConfig};
use intercom_database::{initialize_database, Store};
use intercom_gateway::build_router;
use intercom_realtime::{Coordinator, Hub};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

async fn test_router() -> (axum::Router, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("gateway-test.db");
    let pool = initialize_database(&DatabaseConfig {
        url: format!("sqlite://{}", db_path.display()),
        max_connections: 2,
    })
    .await
    .unwrap();

    let coordinator = Arc::new(Coordinator::new(
        Hub::new(),
        Store::new(pool),
        RealtimeConfig::default(),
    ));

    (build_router(coordinator), temp_dir)
}

#[tokio::test]
async fn health_reports_ok() {
    let (router, _temp_dir) = test_router().await;

    let response = router
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn websocket_route_rejects_plain_http_requests() {
    let (router, _temp_dir) = test_router().await;

    let response = router
        .oneshot(
            Request::builder()
                .uri("/ws?userId=u1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}
