//! Session workflow engine and HTTP adapter tests
//!
//! The adapter runs against a fake upstream axum server bound to an
//! ephemeral port; retry bounds are checked with the scripted upstream.

mod helpers;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use helpers::scripted_upstream::ScriptedUpstream;
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use writeaid_common::config::UpstreamConfig;
use writeaid_svc::models::SentenceUnit;
use writeaid_svc::services::{HttpRemoteCall, RemoteCall, RemoteCallError};

#[derive(Default)]
struct FakeCounters {
    status_polls: AtomicU32,
    chat_lookups: AtomicU32,
}

/// Fake upstream: busy for two polls, result id appears on the second lookup
fn fake_upstream(counters: Arc<FakeCounters>) -> Router {
    Router::new()
        .route(
            "/api/v1/sessions/",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["client_id"], "parsec-backtesting");
                assert_eq!(body["data_source"], "alpha_vantage");
                Json(json!({ "id": 7 }))
            }),
        )
        .route(
            "/api/v1/sessions/:id/",
            get(|State(counters): State<Arc<FakeCounters>>| async move {
                let polls = counters.status_polls.fetch_add(1, Ordering::SeqCst) + 1;
                let status = if polls >= 3 { "idle" } else { "running" };
                Json(json!({ "status": status }))
            }),
        )
        .route(
            "/api/v1/chats/",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["session"], "7");
                assert_eq!(body["use_live_cot"], false);
                Json(json!({ "id": 1 }))
            })
            .get(
                |State(counters): State<Arc<FakeCounters>>,
                 Query(query): Query<HashMap<String, String>>| async move {
                    assert_eq!(query.get("session_id").map(String::as_str), Some("7"));
                    let lookups = counters.chat_lookups.fetch_add(1, Ordering::SeqCst) + 1;
                    let result_id = if lookups >= 2 { json!("abc") } else { Value::Null };
                    Json(json!({ "results": [{ "result_id": result_id }] }))
                },
            ),
        )
        .route(
            "/api/v1/results/:id/",
            get(|| async { Json(json!({ "content": "Cats are wonderful." })) }),
        )
        .route(
            "/fail",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route("/not-json", get(|| async { "plain text" }))
        .with_state(counters)
}

/// Serve `app` on an ephemeral port and return its base URL
async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn adapter(base_url: &str) -> HttpRemoteCall {
    let config = UpstreamConfig {
        base_url: base_url.to_string(),
        request_timeout_secs: 5,
        connect_timeout_secs: 2,
        ..UpstreamConfig::default()
    };
    HttpRemoteCall::new(&config).unwrap()
}

fn unit(text: &str) -> SentenceUnit {
    SentenceUnit {
        index: 0,
        text: text.to_string(),
        preceding_context: None,
        paragraph_context: "Cats are great. Dogs are loyal.".to_string(),
        author: "EB White".to_string(),
    }
}

#[tokio::test]
async fn test_full_workflow_over_http() {
    let counters = Arc::new(FakeCounters::default());
    let base_url = spawn_server(fake_upstream(counters.clone())).await;
    let engine = helpers::engine(Arc::new(adapter(&base_url)));

    let result = engine.run(&unit("Cats are great.")).await;

    assert!(result.success, "workflow failed: {:?}", result.error);
    assert_eq!(result.improved_sentence.as_deref(), Some("Cats are wonderful."));
    assert_eq!(result.session_id.as_deref(), Some("7"));
    assert_eq!(
        result.session_url.as_deref(),
        Some("https://finchat.adgo.dev/?session_id=7")
    );
    assert!(result.error.is_none());
    assert_eq!(counters.status_polls.load(Ordering::SeqCst), 3);
    assert_eq!(counters.chat_lookups.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_error_status_carries_code_and_body() {
    let base_url = spawn_server(fake_upstream(Arc::new(FakeCounters::default()))).await;

    let err = adapter(&base_url)
        .invoke(Method::GET, "/fail", Value::Null)
        .await
        .unwrap_err();

    match err {
        RemoteCallError::Status { status, body, .. } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("Expected Status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_undecodable_body_is_decode_error() {
    let base_url = spawn_server(fake_upstream(Arc::new(FakeCounters::default()))).await;

    let err = adapter(&base_url)
        .invoke(Method::GET, "/not-json", Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteCallError::Decode(_)));
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = adapter(&format!("http://{}", addr))
        .invoke(Method::GET, "/api/v1/sessions/1/", Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteCallError::Transport(_)));
}

#[tokio::test]
async fn test_session_creation_failure_not_retried() {
    let upstream = Arc::new(ScriptedUpstream::new().failing_session_creation());
    let engine = helpers::engine(upstream.clone());

    let result = engine.run(&unit("Cats are great.")).await;

    assert!(!result.success);
    assert!(result.session_id.is_none());
    assert!(result.error.unwrap().contains("Failed to create session"));
    assert_eq!(upstream.sessions_created(), 1);
    assert_eq!(upstream.calls_to(Method::POST, "/api/v1/chats/"), 0);
}

#[tokio::test]
async fn test_missing_result_id_gives_up_after_bound() {
    let upstream = Arc::new(ScriptedUpstream::new().without_result_id());
    let engine = helpers::engine(upstream.clone());

    let result = engine.run(&unit("Cats are great.")).await;

    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("No result id found after 5 attempts")
    );
    assert_eq!(upstream.calls_to(Method::GET, "/api/v1/chats/"), 5);
    assert_eq!(upstream.calls_to(Method::GET, "/api/v1/results/"), 0);
}

#[tokio::test]
async fn test_result_fetch_gives_up_after_bound() {
    let upstream = Arc::new(ScriptedUpstream::new().failing_fetch_for("Cats are great."));
    let engine = helpers::engine(upstream.clone());

    let result = engine.run(&unit("Cats are great.")).await;

    assert!(!result.success);
    assert!(result.error.unwrap().starts_with("Failed to fetch result after 3 attempts"));
    assert_eq!(upstream.calls_to(Method::GET, "/api/v1/results/"), 3);
}

#[tokio::test]
async fn test_polls_until_idle() {
    let upstream = Arc::new(ScriptedUpstream::new().busy_polls(4));
    let engine = helpers::engine(upstream.clone());

    let result = engine.run(&unit("Dogs are loyal.")).await;

    assert!(result.success);
    assert_eq!(result.improved_sentence.as_deref(), Some("Dogs are faithful."));
    assert_eq!(upstream.calls_to(Method::GET, "/api/v1/sessions/"), 5);
}
