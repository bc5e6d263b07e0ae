//! Task status endpoints: re-poll an existing task, or probe it once.

use std::time::Duration;

use axum::extract::{Path, State};
use axum::Json;
use musegen_core::status::TaskStatus;
use musegen_core::task::TaskHandle;
use musegen_modelscope::envelope;
use musegen_modelscope::poller::{poll_task, PollError, UNPOLLABLE_ID_GUIDANCE};
use musegen_modelscope::result::extract_images;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::routes::generate::{persist_outputs, require_cookie};
use crate::state::AppState;

/// Body of `POST /api/v1/tasks/poll`.
#[derive(Debug, Deserialize)]
pub struct PollBody {
    pub task_id: String,
    /// Override the configured attempt budget.
    pub max_attempts: Option<u32>,
    /// Override the configured transport-retry interval, in seconds.
    pub interval_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct PollResponse {
    pub task_id: String,
    pub prompt: Option<String>,
    pub images: Vec<String>,
    pub saved_files: Vec<String>,
}

/// POST /api/v1/tasks/poll
///
/// Poll an already-submitted task to a terminal state. Accepts any id; a
/// non-numeric one fails fast with the gallery guidance rather than burning
/// the attempt budget.
pub async fn poll(
    State(state): State<AppState>,
    Json(body): Json<PollBody>,
) -> AppResult<Json<DataResponse<PollResponse>>> {
    let cookie = require_cookie(&state)?;
    let handle = TaskHandle::classify(body.task_id);

    let mut config = state.config.poll.clone();
    if let Some(max_attempts) = body.max_attempts {
        config.max_attempts = max_attempts;
    }
    if let Some(secs) = body.interval_secs {
        config.base_interval = Duration::from_secs(secs);
    }

    let cancel = state.shutdown.child_token();
    let result = poll_task(&state.modelscope, &handle, &cookie, &config, &cancel).await?;
    let saved_files = persist_outputs(&state, &handle.id, &result).await;

    Ok(Json(DataResponse {
        data: PollResponse {
            task_id: handle.id,
            prompt: result.prompt,
            images: result.image_urls,
            saved_files,
        },
    }))
}

/// Response of the single status probe.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub percent: f64,
    pub detail: String,
    /// Queue depth and position, while waiting for a worker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_total: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<i64>,
    /// Present once the task has succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    /// Present when the task has failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /api/v1/tasks/{task_id}
///
/// One status probe, no looping. An unrecognized response shape maps to
/// UNKNOWN rather than an error: the caller is expected to probe again.
pub async fn status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> AppResult<Json<DataResponse<StatusResponse>>> {
    let cookie = require_cookie(&state)?;
    let handle = TaskHandle::classify(task_id);
    if !handle.is_pollable() {
        return Err(PollError::UnsupportedIdFormat {
            task_id: handle.id,
            guidance: UNPOLLABLE_ID_GUIDANCE,
        }
        .into());
    }

    let body = state.modelscope.task_status(&handle.id, &cookie).await?;
    if envelope::is_unsupported_id_response(&body) {
        return Err(PollError::UnsupportedIdFormat {
            task_id: handle.id,
            guidance: UNPOLLABLE_ID_GUIDANCE,
        }
        .into());
    }

    let response = match envelope::resolve_task_view(&body) {
        Some(view) => {
            let images = (view.status == TaskStatus::Succeeded)
                .then(|| extract_images(&view).urls);
            let (percent, detail) = view
                .progress
                .as_ref()
                .map(|p| (p.percent, p.detail.clone()))
                .unwrap_or((0.0, String::new()));
            StatusResponse {
                task_id: handle.id,
                status: view.status,
                percent,
                detail,
                queue_total: view.queue.as_ref().and_then(|q| q.total),
                queue_position: view.queue.as_ref().and_then(|q| q.position),
                images,
                error: view.error_msg,
            }
        }
        None => {
            tracing::warn!(task_id = %handle.id, "Unrecognized status response shape");
            StatusResponse {
                task_id: handle.id,
                status: TaskStatus::Unknown,
                percent: 0.0,
                detail: String::new(),
                queue_total: None,
                queue_position: None,
                images: None,
                error: None,
            }
        }
    };

    Ok(Json(DataResponse { data: response }))
}
