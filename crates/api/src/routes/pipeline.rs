//! Combined pipeline: caption an uploaded image, then generate from the
//! caption in one call.

use axum::extract::{Multipart, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::routes::describe::require_vision;
use crate::routes::generate::{
    build_request, persist_outputs, poll_to_completion, require_cookie, GenerateBody,
};
use crate::state::AppState;

/// Optional overrides sent as a JSON `options` part alongside the image.
/// Same knobs as the generate endpoint, minus the prompt (the caption is
/// the prompt).
#[derive(Debug, Default, Deserialize)]
pub struct PipelineOptions {
    #[serde(default)]
    pub negative_prompt: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub num_images: Option<u32>,
    pub enable_hires: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct PipelineResponse {
    /// The caption used as the generation prompt.
    pub prompt: String,
    pub task_id: String,
    pub images: Vec<String>,
    pub saved_files: Vec<String>,
}

/// POST /api/v1/pipeline
///
/// Multipart: an image part plus an optional `options` JSON part. The image
/// is captioned, the caption is submitted as the prompt, and the task is
/// polled to completion.
pub async fn run_pipeline(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<DataResponse<PipelineResponse>>> {
    require_vision(&state)?;
    let cookie = require_cookie(&state)?;

    let mut image: Option<(Vec<u8>, String)> = None;
    let mut options = PipelineOptions::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        if field.name() == Some("options") {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(format!("Could not read options: {e}")))?;
            options = serde_json::from_str(&text)
                .map_err(|e| AppError::BadRequest(format!("Invalid options JSON: {e}")))?;
        } else if image.is_none() {
            let mime = field
                .content_type()
                .filter(|ct| ct.starts_with("image/"))
                .unwrap_or("image/png")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Could not read upload: {e}")))?;
            if !bytes.is_empty() {
                image = Some((bytes.to_vec(), mime));
            }
        }
    }
    let (bytes, mime) =
        image.ok_or_else(|| AppError::BadRequest("No image file in multipart body".to_string()))?;

    let prompt = state.vision.describe(&bytes, &mime).await?;
    tracing::info!(caption_chars = prompt.chars().count(), "Image captioned");

    let request = build_request(
        &state,
        GenerateBody {
            prompt: prompt.clone(),
            negative_prompt: options.negative_prompt,
            width: options.width,
            height: options.height,
            num_images: options.num_images,
            enable_hires: options.enable_hires,
            checkpoint: None,
            loras: None,
        },
    );

    let handle = state
        .modelscope
        .submit(&request, &cookie, &state.config.prompt_prefix)
        .await?;
    let result = poll_to_completion(&state, &handle, &cookie).await?;
    let saved_files = persist_outputs(&state, &handle.id, &result).await;

    Ok(Json(DataResponse {
        data: PipelineResponse {
            prompt,
            task_id: handle.id,
            images: result.image_urls,
            saved_files,
        },
    }))
}
