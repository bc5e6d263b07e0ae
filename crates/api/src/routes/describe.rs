//! Image captioning endpoints: turn a picture into a prompt.

use axum::extract::{Multipart, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DescribeResponse {
    pub prompt: String,
}

/// POST /api/v1/describe
///
/// Multipart upload; the first file field is captioned. The part's content
/// type is trusted when present, `image/png` otherwise.
pub async fn describe_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<DataResponse<DescribeResponse>>> {
    require_vision(&state)?;
    let (bytes, mime) = read_image_part(multipart).await?;

    let prompt = state.vision.describe(&bytes, &mime).await?;
    Ok(Json(DataResponse {
        data: DescribeResponse { prompt },
    }))
}

/// Body of `POST /api/v1/describe-url`.
#[derive(Debug, Deserialize)]
pub struct DescribeUrlBody {
    pub url: String,
}

/// POST /api/v1/describe-url
///
/// Fetches the image and captions it.
pub async fn describe_url(
    State(state): State<AppState>,
    Json(body): Json<DescribeUrlBody>,
) -> AppResult<Json<DataResponse<DescribeResponse>>> {
    require_vision(&state)?;

    let response = state
        .http
        .get(&body.url)
        .send()
        .await
        .map_err(|e| AppError::BadRequest(format!("Could not fetch image URL: {e}")))?;
    if !response.status().is_success() {
        return Err(AppError::BadRequest(format!(
            "Image URL returned HTTP {}",
            response.status().as_u16()
        )));
    }

    let mime = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .filter(|ct| ct.starts_with("image/"))
        .unwrap_or("image/png")
        .to_string();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(format!("Could not read image URL: {e}")))?;

    let prompt = state.vision.describe(&bytes, &mime).await?;
    Ok(Json(DataResponse {
        data: DescribeResponse { prompt },
    }))
}

/// Fail with 503 when no vision API key is configured.
pub(crate) fn require_vision(state: &AppState) -> Result<(), AppError> {
    if !state.config.vision_configured() {
        return Err(AppError::NotConfigured(
            "VISION_API_KEY is not set".to_string(),
        ));
    }
    Ok(())
}

/// Pull the first file part out of a multipart upload.
pub(crate) async fn read_image_part(mut multipart: Multipart) -> Result<(Vec<u8>, String), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        if field.file_name().is_none() && field.name() != Some("image") {
            continue;
        }
        let mime = field
            .content_type()
            .filter(|ct| ct.starts_with("image/"))
            .unwrap_or("image/png")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Could not read upload: {e}")))?;
        if bytes.is_empty() {
            return Err(AppError::BadRequest("Uploaded image is empty".to_string()));
        }
        return Ok((bytes.to_vec(), mime));
    }
    Err(AppError::BadRequest(
        "No image file in multipart body".to_string(),
    ))
}
