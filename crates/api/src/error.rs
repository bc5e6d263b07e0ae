use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use musegen_core::error::CoreError;
use musegen_modelscope::client::SubmitError;
use musegen_modelscope::poller::PollError;
use musegen_modelscope::vision::VisionError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain and upstream-client errors and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce consistent JSON error
/// responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `musegen_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A failure submitting to or probing the generation service.
    #[error(transparent)]
    Submit(#[from] SubmitError),

    /// A failure while polling a task to completion.
    #[error(transparent)]
    Poll(#[from] PollError),

    /// A failure from the vision captioning service.
    #[error(transparent)]
    Vision(#[from] VisionError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A required credential or setting is missing from the environment.
    #[error("Service not configured: {0}")]
    NotConfigured(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(CoreError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }

            AppError::Submit(err) => classify_submit_error(err),
            AppError::Poll(err) => classify_poll_error(err),

            AppError::Vision(err) => {
                tracing::error!(error = %err, "Vision captioning failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "VISION_ERROR",
                    err.to_string(),
                )
            }

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),

            AppError::NotConfigured(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "NOT_CONFIGURED", msg.clone())
            }

            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a submit-layer error into an HTTP status, error code, and
/// message.
///
/// - Auth expiry maps to 401 (the caller must re-supply the cookie).
/// - Local validation maps to 400.
/// - Everything the upstream did wrong maps to 502.
fn classify_submit_error(err: &SubmitError) -> (StatusCode, &'static str, String) {
    match err {
        SubmitError::AuthExpired => (
            StatusCode::UNAUTHORIZED,
            "AUTH_EXPIRED",
            "The ModelScope session cookie has expired; supply a fresh one".to_string(),
        ),
        SubmitError::InvalidRequest(core) => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", core.to_string())
        }
        SubmitError::Business(msg) => (
            StatusCode::BAD_GATEWAY,
            "UPSTREAM_REJECTED",
            msg.clone(),
        ),
        SubmitError::NoTaskId(excerpt) => {
            tracing::error!(body = %excerpt, "Submit response carried no task id");
            (
                StatusCode::BAD_GATEWAY,
                "NO_TASK_ID",
                "The service accepted the task but returned no usable task id; \
                 check https://www.modelscope.cn/studios for the result"
                    .to_string(),
            )
        }
        SubmitError::Http { status, body } => {
            tracing::error!(status, body = %body, "Upstream HTTP error");
            (
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_ERROR",
                format!("ModelScope returned HTTP {status}"),
            )
        }
        SubmitError::Request(e) => {
            tracing::error!(error = %e, "Upstream request failed");
            (
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_UNAVAILABLE",
                "Could not reach the ModelScope service".to_string(),
            )
        }
    }
}

/// Classify a poll-loop error.
fn classify_poll_error(err: &PollError) -> (StatusCode, &'static str, String) {
    match err {
        PollError::RemoteFailed(msg) => (
            StatusCode::BAD_GATEWAY,
            "GENERATION_FAILED",
            msg.clone(),
        ),
        PollError::NoImagesInSuccess(excerpt) => {
            tracing::error!(body = %excerpt, "Succeeded task carried no image URLs");
            (
                StatusCode::BAD_GATEWAY,
                "NO_IMAGES",
                "Generation succeeded but no image URLs were found in the response".to_string(),
            )
        }
        PollError::Timeout { attempts } => (
            StatusCode::GATEWAY_TIMEOUT,
            "POLL_TIMEOUT",
            format!("Task did not finish within {attempts} status checks"),
        ),
        PollError::UnsupportedIdFormat { task_id, guidance } => (
            StatusCode::BAD_GATEWAY,
            "UNSUPPORTED_TASK_ID",
            format!("Task {task_id} cannot be polled. {guidance}"),
        ),
        PollError::Cancelled => (
            StatusCode::SERVICE_UNAVAILABLE,
            "SHUTTING_DOWN",
            "The server is shutting down; the task may still finish remotely".to_string(),
        ),
        PollError::Status(inner) => classify_submit_error(inner),
    }
}
