//! HTTP client for the ModelScope "muse" endpoints.
//!
//! Owns the two raw calls (submit a task, probe a task's status) plus the
//! header construction both share. Classification of the varying response
//! envelopes lives in [`crate::envelope`]; id recovery in [`crate::task_id`].

use musegen_core::error::CoreError;
use musegen_core::generation::GenerationRequest;
use musegen_core::task::TaskHandle;
use serde_json::Value;

use crate::auth::{extract_csrf_token, generate_trace_id};
use crate::envelope;
use crate::payload::build_submit_payload;
use crate::task_id::find_task_handle;

/// Default base URL of the ModelScope web API.
pub const DEFAULT_BASE_URL: &str = "https://www.modelscope.cn";

/// Path of the task submission endpoint.
pub const SUBMIT_PATH: &str = "/api/v1/muse/predict/task/submit";

/// Path of the task status endpoint (takes `?taskId=`).
pub const STATUS_PATH: &str = "/api/v1/muse/predict/task/status";

/// Browser user agent sent on every request. The service rejects clients
/// that do not look like a browser.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/140.0.0.0 Safari/537.36";

/// Referer sent on every request; the service checks for its own pages.
const REFERER: &str = "https://www.modelscope.cn/aigc/imageGeneration";

/// Errors from task submission and status probes.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("ModelScope API error ({status}): {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// 2xx response whose envelope reports a logical failure.
    #[error("ModelScope rejected the request: {0}")]
    Business(String),

    /// The service reports the session cookie is no longer valid. Not
    /// retryable; the caller must supply fresh credentials.
    #[error("ModelScope session expired; supply a fresh cookie")]
    AuthExpired,

    /// Successful envelope but no task id anywhere in the body.
    #[error("No task id in submit response: {0}")]
    NoTaskId(String),

    /// The request failed local validation before any HTTP was sent.
    #[error(transparent)]
    InvalidRequest(#[from] CoreError),
}

/// Client for one ModelScope deployment.
///
/// Cheap to construct; holds a pooled [`reqwest::Client`] and the base URL.
/// The cookie is passed per call so one client can serve many credentials.
pub struct ModelScopeClient {
    client: reqwest::Client,
    base_url: String,
}

impl ModelScopeClient {
    /// Create a client for `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`] (connection
    /// pooling across clients).
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Validate and submit a generation request, returning the recovered
    /// task handle.
    ///
    /// `prompt_prefix` is prepended to the positive prompt (see
    /// [`build_submit_payload`]). An empty CSRF token in the cookie is
    /// logged but not fatal; the service will reject the call itself if it
    /// insists on one.
    pub async fn submit(
        &self,
        request: &GenerationRequest,
        cookie: &str,
        prompt_prefix: &str,
    ) -> Result<TaskHandle, SubmitError> {
        request.validate()?;

        let payload = build_submit_payload(request, prompt_prefix);
        let token = extract_csrf_token(cookie);
        if token.is_empty() {
            tracing::warn!("No CSRF token found in cookie; submitting without one");
        }

        let trace_id = generate_trace_id();
        tracing::info!(
            trace_id = %trace_id,
            width = request.width,
            height = request.height,
            num_images = request.num_images,
            "Submitting generation task",
        );

        let response = self
            .request(reqwest::Method::POST, SUBMIT_PATH, cookie, &token, &trace_id)
            .json(&payload)
            .send()
            .await?;

        let body = Self::read_json(response).await?;
        Self::classify_envelope(&body)?;

        let handle = find_task_handle(&body).ok_or_else(|| SubmitError::NoTaskId(excerpt(&body)))?;
        tracing::info!(task_id = %handle.id, kind = ?handle.kind, "Task submitted");
        Ok(handle)
    }

    /// One status probe for `task_id`. Returns the raw response body; the
    /// poller resolves it into a view and decides what to do next.
    pub async fn task_status(&self, task_id: &str, cookie: &str) -> Result<Value, SubmitError> {
        let token = extract_csrf_token(cookie);
        let trace_id = generate_trace_id();

        let response = self
            .request(reqwest::Method::GET, STATUS_PATH, cookie, &token, &trace_id)
            .query(&[("taskId", task_id)])
            .send()
            .await?;

        Self::read_json(response).await
    }

    // ---- private helpers ----

    /// Build a request with the full browser-profile header set.
    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        cookie: &str,
        csrf_token: &str,
        trace_id: &str,
    ) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header("Cookie", cookie)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json, text/plain, */*")
            .header("Accept-Language", "zh-CN,zh;q=0.9,en;q=0.8")
            .header("Origin", &self.base_url)
            .header("Referer", REFERER)
            .header("X-Modelscope-Accept-Language", "zh_CN")
            .header("X-Modelscope-Trace-Id", trace_id);

        if !csrf_token.is_empty() {
            builder = builder.header("X-Csrftoken", csrf_token);
        }
        builder
    }

    /// Ensure a success status and parse the body as JSON.
    async fn read_json(response: reqwest::Response) -> Result<Value, SubmitError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(SubmitError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<Value>().await?)
    }

    /// Reject envelopes whose top-level flags report failure, recognizing
    /// session expiry specially.
    fn classify_envelope(body: &Value) -> Result<(), SubmitError> {
        if envelope::success_flag(body) == Some(false) {
            let message =
                envelope::envelope_message(body).unwrap_or_else(|| "unknown error".to_string());
            if envelope::is_session_expired(&message) {
                return Err(SubmitError::AuthExpired);
            }
            return Err(SubmitError::Business(message));
        }
        if let Some((code, message)) = envelope::business_error(body) {
            if envelope::is_session_expired(&message) {
                return Err(SubmitError::AuthExpired);
            }
            return Err(SubmitError::Business(format!("{message} (code {code})")));
        }
        Ok(())
    }
}

/// Short body excerpt for error messages; full bodies can be huge and may
/// hold session material.
fn excerpt(body: &Value) -> String {
    let mut text = body.to_string();
    if text.len() > 500 {
        text.truncate(500);
        text.push('…');
    }
    text
}
