use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use musegen_api::config::AppConfig;
use musegen_api::router::build_app_router;
use musegen_api::state::AppState;
use musegen_modelscope::poller::PollConfig;
use tower::ServiceExt;

/// Build a test [`AppConfig`] with safe defaults and no credentials.
pub fn test_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        modelscope_base_url: "http://127.0.0.1:1".to_string(),
        modelscope_cookie: String::new(),
        prompt_prefix: String::new(),
        default_width: 928,
        default_height: 1664,
        output_dir: std::env::temp_dir()
            .join("musegen-test-output")
            .to_string_lossy()
            .into_owned(),
        poll: PollConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(0),
            base_interval: Duration::from_millis(1),
            queuing_interval: Duration::from_millis(1),
            processing_interval: Duration::from_millis(1),
            pending_interval: Duration::from_millis(1),
        },
        vision_api_key: String::new(),
        vision_base_url: "http://127.0.0.1:1".to_string(),
        vision_model: "test-model".to_string(),
    }
}

/// Build the full application router with all middleware layers.
///
/// Mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack (CORS, request ID, timeout, tracing,
/// panic recovery) that production uses.
pub fn build_test_app() -> Router {
    let config = test_config();
    let state = AppState::new(config.clone());
    build_app_router(state, &config)
}

/// Issue a GET request against the app.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request builds"),
    )
    .await
    .expect("request succeeds")
}

/// Issue a JSON POST request against the app.
#[allow(dead_code)]
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds"),
    )
    .await
    .expect("request succeeds")
}

/// Parse a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    use http_body_util::BodyExt;
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is JSON")
}

/// Assert a status without consuming the response.
#[allow(dead_code)]
pub fn assert_status(response: &Response<Body>, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}
