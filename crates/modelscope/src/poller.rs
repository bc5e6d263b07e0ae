//! Status polling loop: drive a submitted task to a terminal outcome.
//!
//! Each attempt probes the status endpoint once, resolves whatever envelope
//! came back, and either returns, or sleeps an interval chosen by the
//! current status. Queued tasks wait longer between probes than actively
//! rendering ones; the queue moves on the scale of minutes while rendering
//! progresses on the scale of seconds.

use std::time::Duration;

use musegen_core::generation::GenerationResult;
use musegen_core::status::TaskStatus;
use musegen_core::task::TaskHandle;
use tokio_util::sync::CancellationToken;

use crate::client::{ModelScopeClient, SubmitError};
use crate::envelope::{self, TaskView};
use crate::result::extract_images;

/// User-facing guidance when a task id cannot be polled. The images may
/// still render; they are just only reachable through the service's own UI.
pub const UNPOLLABLE_ID_GUIDANCE: &str =
    "The service returned a task id the status endpoint does not accept \
     (it requires an all-digit id). Check the generation gallery at \
     https://www.modelscope.cn/studios for the finished images.";

/// Tunable parameters of the poll loop.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Maximum number of status probes before giving up.
    pub max_attempts: u32,
    /// Delay before the first probe; a task is never terminal instantly.
    pub initial_delay: Duration,
    /// Sleep after a transport failure.
    pub base_interval: Duration,
    /// Sleep while the task is QUEUING.
    pub queuing_interval: Duration,
    /// Sleep while the task is PROCESSING.
    pub processing_interval: Duration,
    /// Sleep while the task is PENDING or reports an unknown status.
    pub pending_interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            initial_delay: Duration::from_secs(3),
            base_interval: Duration::from_secs(10),
            queuing_interval: Duration::from_secs(15),
            processing_interval: Duration::from_secs(8),
            pending_interval: Duration::from_secs(10),
        }
    }
}

impl PollConfig {
    /// Interval to sleep after observing a non-terminal `status`.
    pub fn interval_for(&self, status: TaskStatus) -> Duration {
        match status {
            TaskStatus::Queuing => self.queuing_interval,
            TaskStatus::Processing => self.processing_interval,
            _ => self.pending_interval,
        }
    }
}

/// Terminal failures of the poll loop.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// The service reported the task FAILED.
    #[error("Generation failed: {0}")]
    RemoteFailed(String),

    /// Terminal SUCCEEDED status, but no image URL in any known shape.
    #[error("Task succeeded but no image URLs were found in the response: {0}")]
    NoImagesInSuccess(String),

    /// The attempt budget ran out with the task still non-terminal.
    #[error("Task did not finish within {attempts} status checks")]
    Timeout { attempts: u32 },

    /// The task id is in a form the status endpoint rejects.
    #[error("Task id {task_id} cannot be polled. {guidance}")]
    UnsupportedIdFormat {
        task_id: String,
        guidance: &'static str,
    },

    /// The caller's cancellation token fired.
    #[error("Polling cancelled")]
    Cancelled,

    /// A non-retryable client-layer failure surfaced mid-poll (e.g. the
    /// session expired between probes).
    #[error(transparent)]
    Status(#[from] SubmitError),
}

/// Poll `handle` until it reaches a terminal state.
///
/// Transport failures and unrecognized response shapes are retried against
/// the same attempt budget; auth expiry aborts immediately. `cancel` is
/// honored before every sleep.
///
/// Best-effort handles short-circuit to [`PollError::UnsupportedIdFormat`]
/// without spending the budget: the status endpoint is known to reject
/// non-digit ids with a NumberFormatException.
// TODO: drop the short-circuit (and `TaskIdKind`) once the status endpoint
// accepts UUID-format ids; the mid-poll 40000 detection below already covers
// the failure if that day never comes.
pub async fn poll_task(
    client: &ModelScopeClient,
    handle: &TaskHandle,
    cookie: &str,
    config: &PollConfig,
    cancel: &CancellationToken,
) -> Result<GenerationResult, PollError> {
    if !handle.is_pollable() {
        tracing::warn!(task_id = %handle.id, "Task id is not numeric; skipping poll");
        return Err(PollError::UnsupportedIdFormat {
            task_id: handle.id.clone(),
            guidance: UNPOLLABLE_ID_GUIDANCE,
        });
    }

    sleep_or_cancel(config.initial_delay, cancel).await?;

    let mut last_status = TaskStatus::Pending;
    for attempt in 1..=config.max_attempts {
        let body = match client.task_status(&handle.id, cookie).await {
            Ok(body) => body,
            Err(SubmitError::AuthExpired) => return Err(SubmitError::AuthExpired.into()),
            Err(e) => {
                tracing::warn!(
                    task_id = %handle.id,
                    attempt,
                    error = %e,
                    "Status probe failed; retrying",
                );
                sleep_or_cancel(config.base_interval, cancel).await?;
                continue;
            }
        };

        if let Some((code, message)) = envelope::business_error(&body) {
            if envelope::is_session_expired(&message) {
                tracing::warn!(task_id = %handle.id, code, "Session expired while polling");
                return Err(PollError::Status(SubmitError::AuthExpired));
            }
        }

        if envelope::is_unsupported_id_response(&body) {
            tracing::warn!(task_id = %handle.id, "Status endpoint rejected the task id format");
            return Err(PollError::UnsupportedIdFormat {
                task_id: handle.id.clone(),
                guidance: UNPOLLABLE_ID_GUIDANCE,
            });
        }

        let Some(view) = envelope::resolve_task_view(&body) else {
            tracing::warn!(
                task_id = %handle.id,
                attempt,
                "Unrecognized status response shape; retrying",
            );
            sleep_or_cancel(config.base_interval, cancel).await?;
            continue;
        };

        log_progress(&handle.id, attempt, &view);
        last_status = view.status;

        match view.status {
            TaskStatus::Succeeded => {
                let extracted = extract_images(&view);
                if extracted.is_empty() {
                    return Err(PollError::NoImagesInSuccess(raw_excerpt(&view)));
                }
                tracing::info!(
                    task_id = %handle.id,
                    attempt,
                    images = extracted.urls.len(),
                    "Task succeeded",
                );
                return Ok(GenerationResult {
                    image_urls: extracted.urls,
                    prompt: extracted.prompt,
                });
            }
            TaskStatus::Failed => {
                let message = view
                    .error_msg
                    .unwrap_or_else(|| "unknown error".to_string());
                tracing::error!(task_id = %handle.id, error = %message, "Task failed");
                return Err(PollError::RemoteFailed(message));
            }
            status => {
                sleep_or_cancel(config.interval_for(status), cancel).await?;
            }
        }
    }

    tracing::error!(
        task_id = %handle.id,
        attempts = config.max_attempts,
        last_status = %last_status,
        "Poll budget exhausted",
    );
    Err(PollError::Timeout {
        attempts: config.max_attempts,
    })
}

/// Sleep for `duration` unless `cancel` fires first.
async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> Result<(), PollError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(PollError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// One structured progress event per probe, keyed by task id.
fn log_progress(task_id: &str, attempt: u32, view: &TaskView) {
    let percent = view.progress.as_ref().map(|p| p.percent).unwrap_or(0.0);
    match &view.queue {
        Some(queue) if !view.status.is_terminal() => tracing::info!(
            task_id = %task_id,
            attempt,
            status = %view.status,
            percent,
            queue_total = queue.total,
            queue_position = queue.position,
            "Task status",
        ),
        _ => tracing::info!(
            task_id = %task_id,
            attempt,
            status = %view.status,
            percent,
            "Task status",
        ),
    }
}

fn raw_excerpt(view: &TaskView) -> String {
    let mut text = view.raw.to_string();
    if text.len() > 500 {
        text.truncate(500);
        text.push('…');
    }
    text
}
