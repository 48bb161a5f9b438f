//! Health Check API Tests

use axum::http::StatusCode;
use axum_test::TestServer;

use dinetalk::presentation::http::routes::create_router;

use crate::common::test_state;

fn server() -> TestServer {
    let (state, _) = test_state();
    TestServer::new(create_router(state)).unwrap()
}

#[tokio::test]
async fn health_returns_healthy() {
    let server = server();
    let response = server.get("/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn liveness_probe_is_alive() {
    let server = server();
    let response = server.get("/health/live").await;

    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn readiness_probe_reports_in_memory_store() {
    let server = server();
    let response = server.get("/health/ready").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["gateway"]["active_sessions"], 0);
}

#[tokio::test]
async fn metrics_endpoint_exposes_prometheus_text() {
    let server = server();
    let response = server.get("/metrics").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(response.text().contains("dinetalk"));
}
