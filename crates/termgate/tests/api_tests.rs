//! API integration tests.
//!
//! Routes are exercised through the real router with a stubbed execution
//! backend; the suggestion upstream is doubled with wiremock.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use termgate::api::{AppState, create_router};
use termgate::config::AppConfig;
use termgate_exec::{ExecBackend, ExecOutcome, ExecResult};

const TOKEN: &str = "test-token";

/// Records invocations instead of spawning anything.
#[derive(Default)]
struct StubExec {
    calls: AtomicUsize,
}

impl StubExec {
    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecBackend for StubExec {
    async fn run(&self, command: &str) -> ExecResult<ExecOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ExecOutcome {
            ok: true,
            stdout: format!("ran: {command}\n"),
            stderr: String::new(),
            error: None,
        })
    }
}

fn test_app(gemini_base: &str) -> (Router, Arc<StubExec>) {
    let mut config = AppConfig::default();
    config.auth.token = TOKEN.to_string();
    config.gemini.api_key = "test-key".to_string();
    config.gemini.base_url = gemini_base.to_string();

    let stub = Arc::new(StubExec::default());
    let state = AppState::new(config, stub.clone()).expect("test state");
    (create_router(Arc::new(state)), stub)
}

fn post_json(uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .uri(uri)
        .method(Method::POST)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_works_without_auth() {
    let (app, _) = test_app("http://127.0.0.1:1");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .method(Method::GET)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn exec_without_token_is_401_and_never_executes() {
    let (app, stub) = test_app("http://127.0.0.1:1");

    let response = app
        .oneshot(post_json("/exec", None, &json!({ "command": "whoami" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(stub.call_count(), 0);
}

#[tokio::test]
async fn exec_with_malformed_header_is_401() {
    let (app, stub) = test_app("http://127.0.0.1:1");

    let request = Request::builder()
        .uri("/exec")
        .method(Method::POST)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Token {TOKEN}"))
        .body(Body::from(json!({ "command": "whoami" }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(stub.call_count(), 0);
}

#[tokio::test]
async fn exec_with_wrong_token_is_403_and_never_executes() {
    let (app, stub) = test_app("http://127.0.0.1:1");

    let response = app
        .oneshot(post_json(
            "/exec",
            Some("wrong-token"),
            &json!({ "command": "whoami" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(stub.call_count(), 0);
}

#[tokio::test]
async fn exec_runs_admitted_command() {
    let (app, stub) = test_app("http://127.0.0.1:1");

    let response = app
        .oneshot(post_json(
            "/exec",
            Some(TOKEN),
            &json!({ "command": "whoami" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["ok"], true);
    assert_eq!(json["stdout"], "ran: whoami\n");
    assert_eq!(stub.call_count(), 1);
}

#[tokio::test]
async fn exec_rejects_forbidden_chars_before_execution() {
    let (app, stub) = test_app("http://127.0.0.1:1");

    for command in ["ls | grep x", "date; whoami", "echo hi > /tmp/x"] {
        let response = app
            .clone()
            .oneshot(post_json(
                "/exec",
                Some(TOKEN),
                &json!({ "command": command }),
            ))
            .await
            .unwrap();

        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "expected 400 for {command:?}"
        );
    }
    assert_eq!(stub.call_count(), 0);
}

#[tokio::test]
async fn exec_enforces_whitelist_on_request() {
    let (app, stub) = test_app("http://127.0.0.1:1");

    let response = app
        .clone()
        .oneshot(post_json(
            "/exec",
            Some(TOKEN),
            &json!({ "command": "rm -rf /", "require_whitelist": true }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(stub.call_count(), 0);

    // prefix-matched commands pass; camelCase key is accepted too
    let response = app
        .oneshot(post_json(
            "/exec",
            Some(TOKEN),
            &json!({ "command": "ls -la", "requireWhitelist": true }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(stub.call_count(), 1);
}

#[tokio::test]
async fn exec_rejects_invalid_command_bodies() {
    let (app, stub) = test_app("http://127.0.0.1:1");

    for body in [
        json!({}),
        json!({ "command": "" }),
        json!({ "command": 42 }),
        json!({ "command": ["whoami"] }),
    ] {
        let response = app
            .clone()
            .oneshot(post_json("/exec", Some(TOKEN), &body))
            .await
            .unwrap();

        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "expected 400 for body {body}"
        );
    }
    assert_eq!(stub.call_count(), 0);
}

#[tokio::test]
async fn suggest_requires_auth() {
    let (app, _) = test_app("http://127.0.0.1:1");

    let response = app
        .oneshot(post_json("/suggest", None, &json!({ "prompt": "list files" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn suggest_rejects_bad_prompt_without_contacting_upstream() {
    let server = MockServer::start().await;
    let (app, _) = test_app(&server.uri());

    for body in [json!({}), json!({ "prompt": "" }), json!({ "prompt": 7 })] {
        let response = app
            .clone()
            .oneshot(post_json("/suggest", Some(TOKEN), &body))
            .await
            .unwrap();

        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "expected 400 for body {body}"
        );
    }

    assert!(
        server.received_requests().await.unwrap().is_empty(),
        "upstream must not be contacted for invalid prompts"
    );
}

#[tokio::test]
async fn suggest_returns_first_candidate_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [
                { "content": { "parts": [ { "text": "{\"suggestions\":[{\"command\":\"whoami\",\"explanation\":\"current user\"}]}" } ] } }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (app, _) = test_app(&server.uri());

    let response = app
        .oneshot(post_json(
            "/suggest",
            Some(TOKEN),
            &json!({ "prompt": "who am i" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["ok"], true);
    assert!(json["raw"].as_str().unwrap().contains("whoami"));
}

#[tokio::test]
async fn suggest_falls_back_to_raw_body_without_candidates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "unexpected": "shape" })),
        )
        .mount(&server)
        .await;

    let (app, _) = test_app(&server.uri());

    let response = app
        .oneshot(post_json(
            "/suggest",
            Some(TOKEN),
            &json!({ "prompt": "anything" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["ok"], true);
    assert!(json["raw"].as_str().unwrap().contains("unexpected"));
}

#[tokio::test]
async fn suggest_surfaces_upstream_api_errors_as_500() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "error": "boom" })),
        )
        .mount(&server)
        .await;

    let (app, _) = test_app(&server.uri());

    let response = app
        .oneshot(post_json(
            "/suggest",
            Some(TOKEN),
            &json!({ "prompt": "list files" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "failed to contact the suggestion API");
    assert!(json["details"].is_string());
}

#[tokio::test]
async fn suggest_surfaces_transport_errors_as_500() {
    // nothing listens here; the connection is refused
    let (app, _) = test_app("http://127.0.0.1:1");

    let response = app
        .oneshot(post_json(
            "/suggest",
            Some(TOKEN),
            &json!({ "prompt": "list files" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "failed to contact the suggestion API");
}
