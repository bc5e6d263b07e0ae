pub mod describe;
pub mod generate;
pub mod health;
pub mod pipeline;
pub mod tasks;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /generate               submit + poll + persist (POST)
/// /tasks/poll             poll an already-submitted task (POST)
/// /tasks/{task_id}        one status probe, no looping (GET)
/// /describe               caption an uploaded image (POST, multipart)
/// /describe-url           caption an image by URL (POST)
/// /pipeline               caption an upload, then generate from it (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/generate", post(generate::generate))
        .route("/tasks/poll", post(tasks::poll))
        .route("/tasks/{task_id}", get(tasks::status))
        .route("/describe", post(describe::describe_upload))
        .route("/describe-url", post(describe::describe_url))
        .route("/pipeline", post(pipeline::run_pipeline))
}
