//! HTTP front door tests driven through `tower::ServiceExt::oneshot`.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{FakeExecutor, ScriptedClassifier, TEST_CALL, proxy_with};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use truckin::channel::ChannelState;
use truckin::http::create_router;

// ============================================================================
// Helpers
// ============================================================================

fn app(state: ChannelState, reply_after: Option<Duration>, template: &str) -> axum::Router {
    let (executor, events) = FakeExecutor::new(state, reply_after);
    let proxy = proxy_with(executor, events, ScriptedClassifier::new(template));
    create_router(Arc::new(proxy))
}

fn chat_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .header("x-user-id", "driver-7")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

// ============================================================================
// POST /chat
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_chat_success_renders_tool_result() {
    let app = app(ChannelState::Ready, Some(Duration::from_millis(5)), TEST_CALL);
    let (status, body) = send(app, chat_request(json!({"message": "test"}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["aiResponse"]["result"], json!({"status": "ok"}));
    assert_eq!(body["action"], json!({"type": "test"}));
    assert!(body["timestamp"].as_str().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_chat_fallback_has_no_action() {
    let app = app(ChannelState::Ready, Some(Duration::ZERO), "no idea, sorry");
    let (status, body) = send(app, chat_request(json!({"message": "hello", "history": []}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body.get("action").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_chat_not_ready_is_503() {
    let app = app(ChannelState::Starting, Some(Duration::ZERO), TEST_CALL);
    let (status, body) = send(app, chat_request(json!({"message": "test"}))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "NOT_READY");
}

#[tokio::test(start_paused = true)]
async fn test_transient_503_sets_retry_after() {
    let app = app(ChannelState::Starting, Some(Duration::ZERO), TEST_CALL);
    let response = app.oneshot(chat_request(json!({"message": "test"}))).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers().get("retry-after").unwrap(), "1");
}

#[tokio::test(start_paused = true)]
async fn test_chat_crashed_is_503() {
    let app = app(ChannelState::Crashed, Some(Duration::ZERO), TEST_CALL);
    let (status, body) = send(app, chat_request(json!({"message": "test"}))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "EXECUTOR_CRASH");
}

#[tokio::test(start_paused = true)]
async fn test_chat_timeout_is_504() {
    let app = app(ChannelState::Ready, None, TEST_CALL);
    let (status, body) = send(app, chat_request(json!({"message": "test"}))).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["code"], "TIMEOUT");
}

#[tokio::test]
async fn test_chat_empty_message_is_400() {
    let app = app(ChannelState::Ready, Some(Duration::ZERO), TEST_CALL);
    let (status, body) = send(app, chat_request(json!({"message": "  "}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_chat_malformed_body_is_400() {
    let app = app(ChannelState::Ready, Some(Duration::ZERO), TEST_CALL);
    let (status, body) = send(app, chat_request(json!({"text": "wrong field"}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

// ============================================================================
// GET /health, GET /tools
// ============================================================================

#[tokio::test]
async fn test_health_reports_executor_state() {
    let app = app(ChannelState::Starting, None, TEST_CALL);
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["executor"], "starting");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_tools_lists_catalog() {
    let app = app(ChannelState::Ready, None, TEST_CALL);
    let request = Request::builder().uri("/tools").body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["test", "make_bid"]);
}
