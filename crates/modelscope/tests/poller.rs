//! Poll-loop scenarios against a scripted in-process status endpoint.
//!
//! The stub binds `127.0.0.1:0` and serves one canned JSON body per request,
//! in order, repeating the last one if the poller asks again. Tests drive
//! the real client and poller against it with millisecond intervals.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use musegen_core::task::TaskHandle;
use musegen_modelscope::client::{ModelScopeClient, SubmitError};
use musegen_modelscope::poller::{poll_task, PollConfig, PollError};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

/// Scripted response sequence plus a counter of requests served.
#[derive(Clone)]
struct Script {
    responses: Arc<Vec<Value>>,
    served: Arc<AtomicUsize>,
}

async fn status_handler(State(script): State<Script>) -> Json<Value> {
    let index = script.served.fetch_add(1, Ordering::SeqCst);
    let response = script
        .responses
        .get(index)
        .or_else(|| script.responses.last())
        .cloned()
        .unwrap_or_else(|| json!({}));
    Json(response)
}

/// Start the stub server; returns its base URL and the request counter.
async fn spawn_stub(responses: Vec<Value>) -> (String, Arc<AtomicUsize>) {
    let served = Arc::new(AtomicUsize::new(0));
    let script = Script {
        responses: Arc::new(responses),
        served: Arc::clone(&served),
    };

    let app = Router::new()
        .route("/api/v1/muse/predict/task/status", get(status_handler))
        .with_state(script);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().expect("stub local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server");
    });

    (format!("http://{addr}"), served)
}

/// Millisecond-scale intervals so scenarios finish instantly.
fn fast_config(max_attempts: u32) -> PollConfig {
    PollConfig {
        max_attempts,
        initial_delay: Duration::from_millis(0),
        base_interval: Duration::from_millis(5),
        queuing_interval: Duration::from_millis(5),
        processing_interval: Duration::from_millis(5),
        pending_interval: Duration::from_millis(5),
    }
}

fn status_body(status: &str) -> Value {
    json!({ "Success": true, "Code": 200, "Data": { "data": { "status": status } } })
}

#[tokio::test]
async fn queuing_then_processing_then_succeeded_returns_urls_in_order() {
    let (base_url, served) = spawn_stub(vec![
        status_body("QUEUING"),
        status_body("PROCESSING"),
        json!({
            "Success": true,
            "Data": { "data": {
                "status": "SUCCEED",
                "predictResult": { "images": [
                    { "imageUrl": "https://cdn.example.com/first.png", "prompt": "a lighthouse" },
                    { "imageUrl": "https://cdn.example.com/second.png" },
                ]}
            }}
        }),
    ])
    .await;

    let client = ModelScopeClient::new(base_url);
    let handle = TaskHandle::numeric("778899");
    let result = poll_task(
        &client,
        &handle,
        "csrf_token=t",
        &fast_config(10),
        &CancellationToken::new(),
    )
    .await
    .expect("poll should succeed");

    assert_eq!(
        result.image_urls,
        vec![
            "https://cdn.example.com/first.png",
            "https://cdn.example.com/second.png"
        ]
    );
    assert_eq!(result.prompt.as_deref(), Some("a lighthouse"));
    assert_eq!(served.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn failed_status_returns_remote_failed_without_further_polling() {
    let (base_url, served) = spawn_stub(vec![json!({
        "Success": true,
        "Data": { "data": { "status": "FAILED", "errorMsg": "quota exceeded" } }
    })])
    .await;

    let client = ModelScopeClient::new(base_url);
    let handle = TaskHandle::numeric("778899");
    let err = poll_task(
        &client,
        &handle,
        "csrf_token=t",
        &fast_config(10),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert_matches!(err, PollError::RemoteFailed(msg) if msg == "quota exceeded");
    assert_eq!(served.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_without_error_message_reports_unknown_error() {
    let (base_url, _) = spawn_stub(vec![json!({
        "Success": true,
        "Data": { "data": { "status": "FAILED" } }
    })])
    .await;

    let client = ModelScopeClient::new(base_url);
    let handle = TaskHandle::numeric("778899");
    let err = poll_task(
        &client,
        &handle,
        "csrf_token=t",
        &fast_config(10),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert_matches!(err, PollError::RemoteFailed(msg) if msg == "unknown error");
}

#[tokio::test]
async fn attempt_budget_exhausted_returns_timeout_after_exactly_max_attempts() {
    let (base_url, served) = spawn_stub(vec![status_body("PROCESSING")]).await;

    let client = ModelScopeClient::new(base_url);
    let handle = TaskHandle::numeric("778899");
    let err = poll_task(
        &client,
        &handle,
        "csrf_token=t",
        &fast_config(3),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert_matches!(err, PollError::Timeout { attempts: 3 });
    assert_eq!(served.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn succeeded_with_empty_image_list_is_an_error_not_ok() {
    let (base_url, _) = spawn_stub(vec![json!({
        "Success": true,
        "Data": { "data": {
            "status": "SUCCEED",
            "predictResult": { "images": [] }
        }}
    })])
    .await;

    let client = ModelScopeClient::new(base_url);
    let handle = TaskHandle::numeric("778899");
    let err = poll_task(
        &client,
        &handle,
        "csrf_token=t",
        &fast_config(10),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert_matches!(err, PollError::NoImagesInSuccess(_));
}

#[tokio::test]
async fn unrecognized_response_shape_is_retried_within_the_same_budget() {
    let (base_url, served) = spawn_stub(vec![
        json!({ "Success": true, "unexpected": { "status": "PROCESSING" } }),
        status_body("PROCESSING"),
        json!({
            "Success": true,
            "Data": { "data": {
                "status": "SUCCESS",
                "predictResult": { "images": [ { "imageUrl": "https://cdn.example.com/ok.png" } ] }
            }}
        }),
    ])
    .await;

    let client = ModelScopeClient::new(base_url);
    let handle = TaskHandle::numeric("778899");
    let result = poll_task(
        &client,
        &handle,
        "csrf_token=t",
        &fast_config(10),
        &CancellationToken::new(),
    )
    .await
    .expect("poll should recover from the odd response");

    assert_eq!(result.image_urls, vec!["https://cdn.example.com/ok.png"]);
    assert_eq!(served.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn mid_poll_id_format_rejection_short_circuits() {
    let (base_url, served) = spawn_stub(vec![json!({
        "Code": 40000,
        "Success": false,
        "Data": { "message": "For input string: \"abc\" java.lang.NumberFormatException" }
    })])
    .await;

    let client = ModelScopeClient::new(base_url);
    // Numeric-looking handle; the endpoint still rejects it.
    let handle = TaskHandle::numeric("778899");
    let err = poll_task(
        &client,
        &handle,
        "csrf_token=t",
        &fast_config(10),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert_matches!(err, PollError::UnsupportedIdFormat { .. });
    assert_eq!(served.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn session_expiry_mid_poll_aborts_with_auth_expired() {
    let (base_url, served) = spawn_stub(vec![
        status_body("PROCESSING"),
        json!({
            "Success": true,
            "Data": { "code": 401, "message": "会话已过期，请重新登录" }
        }),
    ])
    .await;

    let client = ModelScopeClient::new(base_url);
    let handle = TaskHandle::numeric("778899");
    let err = poll_task(
        &client,
        &handle,
        "csrf_token=t",
        &fast_config(10),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert_matches!(err, PollError::Status(SubmitError::AuthExpired));
    assert_eq!(served.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn status_synonyms_from_the_wire_reach_the_extractor() {
    let (base_url, _) = spawn_stub(vec![
        status_body("QUEUED"),
        status_body("RUNNING"),
        json!({
            "Success": true,
            "Data": { "data": {
                "status": "COMPLETED",
                "predictResult": { "images": [ { "imageUrl": "https://cdn.example.com/done.jpg" } ] }
            }}
        }),
    ])
    .await;

    let client = ModelScopeClient::new(base_url);
    let handle = TaskHandle::numeric("42");
    let result = poll_task(
        &client,
        &handle,
        "csrf_token=t",
        &fast_config(10),
        &CancellationToken::new(),
    )
    .await
    .expect("synonym statuses should poll to completion");

    assert_eq!(result.image_urls, vec!["https://cdn.example.com/done.jpg"]);
}
