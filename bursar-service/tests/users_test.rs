mod common;

use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use common::TestApp;

#[tokio::test]
async fn user_routes_require_authentication() {
    let app = TestApp::new();

    let (status, _) = app.request("GET", "/api/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn lists_and_fetches_users() {
    let app = TestApp::new();
    let (admin, token) = app.authed_user().await;
    let other = app.seed_user("other@example.com").await;

    let (status, body) = app.get("/api/users", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = app.get(&format!("/api/users/{}", other.id), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "other@example.com");

    let (status, _) = app
        .get(&format!("/api/users/{}", Uuid::new_v4()), &token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Sanity: both seeded users keep distinct ids.
    assert_ne!(admin.id, other.id);
}

#[tokio::test]
async fn updates_user_fields() {
    let app = TestApp::new();
    let (admin, token) = app.authed_user().await;

    let (status, body) = app
        .patch(
            &format!("/api/users/{}", admin.id),
            &token,
            json!({ "name": "Renamed Admin" }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Renamed Admin");
    assert_eq!(body["email"], admin.email);
}

#[tokio::test]
async fn update_rejects_email_already_in_use() {
    let app = TestApp::new();
    let (_, token) = app.authed_user().await;
    let victim = app.seed_user("victim@example.com").await;

    let (status, _) = app
        .patch(
            &format!("/api/users/{}", victim.id),
            &token,
            json!({ "email": "admin@example.com" }),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn deletes_users_once() {
    let app = TestApp::new();
    let (_, token) = app.authed_user().await;
    let target = app.seed_user("target@example.com").await;
    let uri = format!("/api/users/{}", target.id);

    let (status, _) = app.delete(&uri, &token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.delete(&uri, &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get(&uri, &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
