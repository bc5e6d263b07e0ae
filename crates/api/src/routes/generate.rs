//! Text-to-image generation: submit, poll to completion, persist outputs.

use std::path::Path;

use axum::extract::State;
use axum::Json;
use musegen_core::generation::{CheckpointRef, GenerationRequest, GenerationResult, LoraRef};
use musegen_core::task::TaskHandle;
use musegen_modelscope::poller::poll_task;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `POST /api/v1/generate`. Everything except the prompt falls back
/// to configured or built-in defaults.
#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub num_images: Option<u32>,
    pub enable_hires: Option<bool>,
    pub checkpoint: Option<CheckpointRef>,
    pub loras: Option<Vec<LoraRef>>,
}

/// Response for generation and poll endpoints.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub task_id: String,
    /// Final prompt as echoed by the service, when available.
    pub prompt: Option<String>,
    /// Image URLs in the order the service reported them.
    pub images: Vec<String>,
    /// Files written under the output directory, when persistence succeeded.
    pub saved_files: Vec<String>,
}

/// POST /api/v1/generate
///
/// Submits the task, polls it to a terminal state, downloads the images
/// into the output directory, and returns the URLs. Persistence failures
/// are logged but do not fail the request; the URLs are the primary result.
pub async fn generate(
    State(state): State<AppState>,
    Json(body): Json<GenerateBody>,
) -> AppResult<Json<DataResponse<GenerateResponse>>> {
    let cookie = require_cookie(&state)?;
    let request = build_request(&state, body);

    let handle = state
        .modelscope
        .submit(&request, &cookie, &state.config.prompt_prefix)
        .await?;

    let result = poll_to_completion(&state, &handle, &cookie).await?;
    let saved_files = persist_outputs(&state, &handle.id, &result).await;

    Ok(Json(DataResponse {
        data: GenerateResponse {
            task_id: handle.id,
            prompt: result.prompt,
            images: result.image_urls,
            saved_files,
        },
    }))
}

/// Fetch the configured cookie or fail with 503.
pub(crate) fn require_cookie(state: &AppState) -> Result<String, AppError> {
    if !state.config.cookie_configured() {
        return Err(AppError::NotConfigured(
            "MODELSCOPE_COOKIE is not set".to_string(),
        ));
    }
    Ok(state.config.modelscope_cookie.clone())
}

/// Merge the request body with configured defaults.
pub(crate) fn build_request(state: &AppState, body: GenerateBody) -> GenerationRequest {
    let defaults = GenerationRequest::default();
    GenerationRequest {
        prompt: body.prompt,
        negative_prompt: body.negative_prompt,
        width: body.width.unwrap_or(state.config.default_width),
        height: body.height.unwrap_or(state.config.default_height),
        num_images: body.num_images.unwrap_or(defaults.num_images),
        hires_fix: body.enable_hires.unwrap_or(defaults.hires_fix),
        checkpoint: body.checkpoint.unwrap_or_default(),
        loras: body.loras.unwrap_or(defaults.loras),
        ..defaults
    }
}

/// Poll `handle` with the configured budget, honoring server shutdown.
pub(crate) async fn poll_to_completion(
    state: &AppState,
    handle: &TaskHandle,
    cookie: &str,
) -> Result<GenerationResult, AppError> {
    let cancel = state.shutdown.child_token();
    let result = poll_task(&state.modelscope, handle, cookie, &state.config.poll, &cancel).await?;
    Ok(result)
}

/// Persist outputs, logging rather than propagating failures.
pub(crate) async fn persist_outputs(
    state: &AppState,
    task_id: &str,
    result: &GenerationResult,
) -> Vec<String> {
    match crate::persist::save_task_outputs(
        &state.http,
        Path::new(&state.config.output_dir),
        task_id,
        result.prompt.as_deref(),
        &result.image_urls,
    )
    .await
    {
        Ok(saved) => saved.images.into_iter().map(|i| i.file_name).collect(),
        Err(e) => {
            tracing::error!(task_id = %task_id, error = %e, "Failed to persist task outputs");
            Vec::new()
        }
    }
}
