//! Response-envelope resolution for the status endpoint.
//!
//! Status responses arrive in several envelope nestings depending on which
//! gateway served them: the task payload has been observed under
//! `Data.data`, under `Data`, and under lowercase `data`. [`resolve_task_view`]
//! probes those nestings in order and normalizes whichever matches into a
//! [`TaskView`] so the rest of the crate never touches raw envelopes.

use musegen_core::status::TaskStatus;
use serde_json::Value;

/// Substring in an error message indicating the session cookie expired.
pub const SESSION_EXPIRED_MARKER: &str = "会话已过期";

/// Error code returned when the status endpoint rejects a non-numeric id.
pub const UNSUPPORTED_ID_CODE: i64 = 40_000;

/// Exception name leaked by the service when a task id fails numeric parsing.
pub const NUMBER_FORMAT_MARKER: &str = "NumberFormatException";

// ---------------------------------------------------------------------------
// Canonical task view
// ---------------------------------------------------------------------------

/// Rendering progress as reported by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskProgress {
    /// Completion percentage, `0.0..=100.0`.
    pub percent: f64,
    /// Free-form progress detail text.
    pub detail: String,
}

/// Queue position, reported while a task waits for a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueInfo {
    pub total: Option<i64>,
    pub position: Option<i64>,
}

/// Canonical view of one status response, whatever envelope it arrived in.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskView {
    /// Canonicalized status.
    pub status: TaskStatus,
    /// Status string exactly as the service sent it.
    pub raw_status: String,
    pub progress: Option<TaskProgress>,
    pub queue: Option<QueueInfo>,
    /// The `predictResult` node, untouched; interpreted by the result
    /// extractor once the task is terminal.
    pub predict_result: Option<Value>,
    /// The `errorMsg` field, present on failed tasks.
    pub error_msg: Option<String>,
    /// The full response body. Kept so last-resort URL scans can walk the
    /// whole tree, not just the resolved payload.
    pub raw: Value,
}

/// Locate the task payload inside `body` and normalize it.
///
/// Probes `Data.data`, then `Data`, then `data`. A candidate qualifies when
/// it is an object carrying a string `status` field. Returns `None` when no
/// nesting matches; callers treat that as an unrecognized response and keep
/// polling rather than failing.
pub fn resolve_task_view(body: &Value) -> Option<TaskView> {
    let candidates = [
        body.pointer("/Data/data"),
        body.pointer("/Data"),
        body.pointer("/data"),
    ];

    candidates
        .into_iter()
        .flatten()
        .find_map(|candidate| view_from(candidate, body))
}

/// Normalize one candidate payload node, or `None` if it does not look like
/// a task payload.
fn view_from(node: &Value, body: &Value) -> Option<TaskView> {
    let raw_status = node.get("status")?.as_str()?.to_string();

    let progress = node.get("progress").and_then(|p| {
        // An empty or absent progress object is treated as no progress info.
        let percent = p.get("percent")?.as_f64()?;
        let detail = p
            .get("detail")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Some(TaskProgress { percent, detail })
    });

    let queue = node.get("taskQueue").and_then(Value::as_object).map(|q| QueueInfo {
        total: q.get("total").and_then(Value::as_i64),
        position: q.get("currentPosition").and_then(Value::as_i64),
    });

    let error_msg = node
        .get("errorMsg")
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(TaskView {
        status: TaskStatus::parse(&raw_status),
        raw_status,
        progress,
        queue,
        predict_result: node.get("predictResult").cloned(),
        error_msg,
        raw: body.clone(),
    })
}

// ---------------------------------------------------------------------------
// Envelope-level classification
// ---------------------------------------------------------------------------

/// Top-level success flag (`Success` or `success`), when present.
pub fn success_flag(body: &Value) -> Option<bool> {
    body.get("Success")
        .or_else(|| body.get("success"))
        .and_then(Value::as_bool)
}

/// Best available top-level error message: `Message`, `message`, or
/// `Data.message`.
pub fn envelope_message(body: &Value) -> Option<String> {
    body.get("Message")
        .or_else(|| body.get("message"))
        .or_else(|| body.pointer("/Data/message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Business error carried inside a 2xx envelope: `Data.code` present and
/// non-zero. Returns the code and its message.
pub fn business_error(body: &Value) -> Option<(i64, String)> {
    let code = body.pointer("/Data/code").and_then(Value::as_i64)?;
    if code == 0 {
        return None;
    }
    let message = body
        .pointer("/Data/message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    Some((code, message))
}

/// True when the response says the submitted id is not accepted by the
/// status endpoint (it expects an all-digit id).
pub fn is_unsupported_id_response(body: &Value) -> bool {
    if body.get("Code").and_then(Value::as_i64) == Some(UNSUPPORTED_ID_CODE) {
        return true;
    }
    body.pointer("/Data/message")
        .and_then(Value::as_str)
        .is_some_and(|m| m.contains(NUMBER_FORMAT_MARKER))
}

/// True when an error message marks an expired session cookie.
pub fn is_session_expired(message: &str) -> bool {
    message.contains(SESSION_EXPIRED_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_payload_under_data_dot_data() {
        let body = json!({
            "Success": true,
            "Data": { "data": { "status": "PROCESSING", "progress": { "percent": 40, "detail": "rendering" } } }
        });
        let view = resolve_task_view(&body).unwrap();
        assert_eq!(view.status, TaskStatus::Processing);
        assert_eq!(view.raw_status, "PROCESSING");
        let progress = view.progress.unwrap();
        assert_eq!(progress.percent, 40.0);
        assert_eq!(progress.detail, "rendering");
    }

    #[test]
    fn resolves_payload_under_capital_data() {
        let body = json!({ "Data": { "status": "QUEUING" } });
        let view = resolve_task_view(&body).unwrap();
        assert_eq!(view.status, TaskStatus::Queuing);
    }

    #[test]
    fn resolves_payload_under_lowercase_data() {
        let body = json!({ "data": { "status": "SUCCEED" } });
        let view = resolve_task_view(&body).unwrap();
        assert_eq!(view.status, TaskStatus::Succeeded);
    }

    #[test]
    fn inner_nesting_shadows_outer() {
        // Data itself has a status, but Data.data is the real payload.
        let body = json!({
            "Data": {
                "status": "WRAPPER",
                "data": { "status": "FAILED", "errorMsg": "quota exceeded" }
            }
        });
        let view = resolve_task_view(&body).unwrap();
        assert_eq!(view.status, TaskStatus::Failed);
        assert_eq!(view.error_msg.as_deref(), Some("quota exceeded"));
    }

    #[test]
    fn unrecognized_shape_yields_none() {
        let body = json!({ "Success": true, "payload": { "status": "PROCESSING" } });
        assert!(resolve_task_view(&body).is_none());
    }

    #[test]
    fn resolution_is_idempotent() {
        let body = json!({
            "Data": { "data": { "status": "PENDING", "taskQueue": { "total": 12, "currentPosition": 3 } } }
        });
        let first = resolve_task_view(&body).unwrap();
        let second = resolve_task_view(&body).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn queue_info_extracted_from_task_queue() {
        let body = json!({
            "Data": { "data": { "status": "PENDING", "taskQueue": { "total": 12, "currentPosition": 3 } } }
        });
        let view = resolve_task_view(&body).unwrap();
        let queue = view.queue.unwrap();
        assert_eq!(queue.total, Some(12));
        assert_eq!(queue.position, Some(3));
    }

    #[test]
    fn business_error_detected_on_nonzero_code() {
        let body = json!({ "Data": { "code": 10010101004i64, "message": "无效的会话" } });
        let (code, message) = business_error(&body).unwrap();
        assert_eq!(code, 10010101004);
        assert_eq!(message, "无效的会话");
    }

    #[test]
    fn zero_code_is_not_a_business_error() {
        let body = json!({ "Data": { "code": 0, "message": "ok" } });
        assert!(business_error(&body).is_none());
    }

    #[test]
    fn unsupported_id_detected_by_code() {
        let body = json!({ "Code": 40000, "Success": false });
        assert!(is_unsupported_id_response(&body));
    }

    #[test]
    fn unsupported_id_detected_by_exception_marker() {
        let body = json!({
            "Data": { "message": "For input string: \"abc\" java.lang.NumberFormatException" }
        });
        assert!(is_unsupported_id_response(&body));
    }

    #[test]
    fn session_expiry_detected_in_message() {
        assert!(is_session_expired("会话已过期，请重新登录"));
        assert!(!is_session_expired("quota exceeded"));
    }

    #[test]
    fn success_flag_reads_both_casings() {
        assert_eq!(success_flag(&json!({ "Success": true })), Some(true));
        assert_eq!(success_flag(&json!({ "success": false })), Some(false));
        assert_eq!(success_flag(&json!({})), None);
    }
}
