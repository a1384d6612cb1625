mod common;

use axum::http::StatusCode;

use common::TestApp;

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::new();

    let (status, body) = app.request("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "bursar-service");
}

#[tokio::test]
async fn metrics_endpoint_is_public() {
    let app = TestApp::new();

    let (status, _) = app.request("GET", "/metrics", None, None).await;

    assert_eq!(status, StatusCode::OK);
}
