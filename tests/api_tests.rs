use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use cinesphere::api::{create_router, AppState};
use cinesphere::config::Config;
use cinesphere::context::ServiceContext;
use cinesphere::models::fallback_catalog;
use cinesphere::services::ai::UNAVAILABLE_REPLY;
use cinesphere::session::Session;

async fn create_test_app() -> Router {
    let ctx = ServiceContext::offline(&Config::default());
    let session = Session::start(ctx).await;
    create_router(AppState::new(session))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Polls the view until the signed-in user's profile has been delivered
async fn wait_for_profile(app: &Router) -> Value {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let (_, view) = send(app, "GET", "/view", None).await;
            if !view["profile"].is_null() {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("profile never delivered")
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app().await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_action_id_header_is_echoed() {
    let app = create_test_app().await;
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-action-id", "6f1c1a52-3c55-4b7e-9d1e-0c3f3b0f8a11")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.headers()["x-action-id"],
        "6f1c1a52-3c55-4b7e-9d1e-0c3f3b0f8a11"
    );
}

#[tokio::test]
async fn test_initial_view_is_home_with_bundled_catalog() {
    let app = create_test_app().await;
    let (status, view) = send(&app, "GET", "/view", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["selector"]["kind"], "home");
    assert_eq!(view["page"]["view"], "home");
    assert_eq!(view["ai_available"], false);
    assert_eq!(view["user"]["is_anonymous"], true);

    let hero = view["page"]["hero"]["id"].as_str().unwrap();
    assert!(fallback_catalog().iter().any(|m| m.id == hero));
}

#[tokio::test]
async fn test_navigate_and_back() {
    let app = create_test_app().await;

    let (status, view) = send(
        &app,
        "POST",
        "/navigate",
        Some(json!({"kind": "search", "payload": {"query": "dune"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["page"]["view"], "search");

    let (_, view) = send(&app, "POST", "/back", None).await;
    assert_eq!(view["page"]["view"], "home");
}

#[tokio::test]
async fn test_toggle_watch_later() {
    let app = create_test_app().await;
    wait_for_profile(&app).await;

    let (status, body) = send(&app, "POST", "/library/watch-later/fallback-dune-2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], true);

    let (_, view) = send(&app, "GET", "/view", None).await;
    assert_eq!(view["profile"]["watchLater"], json!(["fallback-dune-2"]));

    let (_, body) = send(&app, "POST", "/library/watch-later/fallback-dune-2", None).await;
    assert_eq!(body["active"], false);
}

#[tokio::test]
async fn test_create_post_requires_content() {
    let app = create_test_app().await;
    wait_for_profile(&app).await;

    let (status, body) = send(&app, "POST", "/posts", Some(json!({"mode": "normal"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = send(
        &app,
        "POST",
        "/posts",
        Some(json!({"mode": "normal", "text": "Loved the sandworm scene"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(!body["id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_genie_without_key_returns_unavailable_reply() {
    let app = create_test_app().await;
    let (status, body) = send(&app, "POST", "/genie", Some(json!({"prompt": "Best heist movie?"}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], UNAVAILABLE_REPLY);
}

#[tokio::test]
async fn test_actions_after_logout_are_unauthorized() {
    let app = create_test_app().await;

    let (status, _) = send(&app, "POST", "/auth/logout", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, view) = send(&app, "GET", "/view", None).await;
    assert!(view["user"].is_null());

    let (status, body) = send(&app, "POST", "/library/liked/fallback-dune-2", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_register_creates_named_profile() {
    let app = create_test_app().await;
    let (status, user) = send(
        &app,
        "POST",
        "/auth/register",
        Some(json!({"name": "Ada", "email": "ada@example.com", "password": "secret1"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["display_name"], "Ada");
    assert_eq!(user["is_anonymous"], false);

    let view = wait_for_profile(&app).await;
    assert_eq!(view["profile"]["name"], "Ada");
    assert_eq!(view["profile"]["uid"], user["uid"]);
}

#[tokio::test]
async fn test_login_reports_provider_error_verbatim() {
    let app = create_test_app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/auth/login",
        Some(json!({"email": "nobody@example.com", "password": "secret1"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "EMAIL_NOT_FOUND");
}

#[tokio::test]
async fn test_navigate_without_payload() {
    let app = create_test_app().await;
    let (status, view) = send(&app, "POST", "/navigate", Some(json!({"kind": "feed"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["selector"], json!({"kind": "feed", "payload": {"tab": "for_you"}}));
    assert_eq!(view["page"]["view"], "feed");
}
