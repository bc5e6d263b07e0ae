//! Task-id recovery from submit responses.
//!
//! The submit endpoint does not commit to a single response shape: the task
//! id has been observed at four different paths, as a JSON number or a
//! string, and occasionally missing entirely with only a request id to go
//! by. Recovery runs cheap direct probes first and falls back to tree
//! searches, always preferring an all-digit id (the status endpoint rejects
//! anything else).

use musegen_core::task::{is_numeric_id, TaskHandle};
use serde_json::Value;

/// Known direct locations of a numeric task id, in probe order.
const TASK_ID_PATHS: &[&str] = &["/data/taskId", "/Data/data/taskId", "/Data/taskId", "/taskId"];

/// Known direct locations of a request id, used only when no numeric task
/// id exists anywhere in the document.
const REQUEST_ID_PATHS: &[&str] = &["/Data/requestId", "/requestId", "/RequestId"];

/// Recover a task handle from a submit response body.
///
/// Strategy, in order:
/// 1. Direct probes at the known task-id paths, accepting digits only.
/// 2. Depth-first search for any `taskId`/`task_id` key with an all-digit
///    value.
/// 3. Direct probes at the known request-id paths.
/// 4. Depth-first search for generic id-shaped fields.
///
/// Steps 3 and 4 produce [`TaskHandle::best_effort`] handles and log a
/// warning, since the status endpoint may reject those ids.
pub fn find_task_handle(body: &Value) -> Option<TaskHandle> {
    for path in TASK_ID_PATHS {
        if let Some(id) = body.pointer(path).and_then(as_id_string) {
            if is_numeric_id(&id) {
                return Some(TaskHandle::numeric(id));
            }
        }
    }

    if let Some(id) = find_numeric_task_id(body) {
        tracing::debug!(task_id = %id, "Recovered numeric task id via tree search");
        return Some(TaskHandle::numeric(id));
    }

    for path in REQUEST_ID_PATHS {
        if let Some(id) = body.pointer(path).and_then(as_id_string) {
            tracing::warn!(
                task_id = %id,
                path,
                "No numeric task id in submit response; falling back to request id",
            );
            return Some(TaskHandle::best_effort(id));
        }
    }

    if let Some(id) = find_any_id(body) {
        tracing::warn!(
            task_id = %id,
            "No task or request id in submit response; falling back to a generic id field",
        );
        return Some(TaskHandle::best_effort(id));
    }

    None
}

/// Render a JSON leaf as an id string. Accepts strings and integer numbers;
/// everything else (objects, arrays, floats, null) is not an id.
fn as_id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.is_u64() || n.is_i64() => Some(n.to_string()),
        _ => None,
    }
}

/// Depth-first search for a `taskId`/`task_id` key holding an all-digit
/// value. Object fields are visited in document order.
fn find_numeric_task_id(node: &Value) -> Option<String> {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                let lowered = key.to_ascii_lowercase();
                if lowered == "taskid" || lowered == "task_id" {
                    if let Some(id) = as_id_string(value) {
                        if is_numeric_id(&id) {
                            return Some(id);
                        }
                    }
                }
                if let Some(found) = find_numeric_task_id(value) {
                    return Some(found);
                }
            }
            None
        }
        Value::Array(items) => items.iter().find_map(find_numeric_task_id),
        _ => None,
    }
}

/// Depth-first search for anything id-shaped: a `taskId`/`task_id`/`id` key
/// with a usable value, or a string that looks like an id under a key
/// mentioning `request`, `id`, or `code`.
fn find_any_id(node: &Value) -> Option<String> {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                let lowered = key.to_ascii_lowercase();
                if matches!(lowered.as_str(), "taskid" | "task_id" | "id") {
                    if let Some(id) = as_id_string(value) {
                        return Some(id);
                    }
                }
                if let Value::String(s) = value {
                    if looks_like_id(s)
                        && (lowered.contains("request") || lowered.contains("id") || lowered == "code")
                    {
                        return Some(s.clone());
                    }
                }
                if let Some(found) = find_any_id(value) {
                    return Some(found);
                }
            }
            None
        }
        Value::Array(items) => items.iter().find_map(find_any_id),
        _ => None,
    }
}

/// Heuristic for id-shaped strings: moderate length and at least one digit.
fn looks_like_id(s: &str) -> bool {
    s.len() > 5 && s.len() < 50 && s.bytes().any(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use musegen_core::task::TaskIdKind;
    use serde_json::json;

    #[test]
    fn nested_numeric_task_id_found() {
        let body = json!({ "Data": { "data": { "taskId": 778899 } } });
        let handle = find_task_handle(&body).unwrap();
        assert_eq!(handle.id, "778899");
        assert_eq!(handle.kind, TaskIdKind::Numeric);
    }

    #[test]
    fn string_task_id_accepted_at_direct_path() {
        let body = json!({ "data": { "taskId": "424242" } });
        let handle = find_task_handle(&body).unwrap();
        assert_eq!(handle.id, "424242");
        assert_eq!(handle.kind, TaskIdKind::Numeric);
    }

    #[test]
    fn numeric_task_id_preferred_over_earlier_request_id() {
        // requestId appears first in document order, but the numeric taskId
        // deeper in the tree must win.
        let body = json!({
            "Data": {
                "requestId": "550e8400-e29b-41d4-a716-446655440000",
                "data": { "taskId": 778899 }
            }
        });
        let handle = find_task_handle(&body).unwrap();
        assert_eq!(handle.id, "778899");
        assert_eq!(handle.kind, TaskIdKind::Numeric);
    }

    #[test]
    fn tree_search_finds_task_id_at_unknown_path() {
        let body = json!({ "result": { "inner": [ { "task_id": "990011" } ] } });
        let handle = find_task_handle(&body).unwrap();
        assert_eq!(handle.id, "990011");
        assert_eq!(handle.kind, TaskIdKind::Numeric);
    }

    #[test]
    fn request_id_yields_best_effort_handle() {
        let body = json!({ "Data": { "requestId": "550e8400-e29b-41d4-a716-446655440000" } });
        let handle = find_task_handle(&body).unwrap();
        assert_eq!(handle.id, "550e8400-e29b-41d4-a716-446655440000");
        assert_eq!(handle.kind, TaskIdKind::BestEffort);
    }

    #[test]
    fn non_numeric_task_id_falls_through_to_generic_search() {
        let body = json!({ "taskId": "abc-123-def" });
        let handle = find_task_handle(&body).unwrap();
        // Picked up by the generic search, flagged best-effort.
        assert_eq!(handle.id, "abc-123-def");
        assert_eq!(handle.kind, TaskIdKind::BestEffort);
    }

    #[test]
    fn id_like_string_under_request_key_recovered() {
        let body = json!({ "Data": { "traceRequest": "req-20240901-771" } });
        let handle = find_task_handle(&body).unwrap();
        assert_eq!(handle.id, "req-20240901-771");
        assert_eq!(handle.kind, TaskIdKind::BestEffort);
    }

    #[test]
    fn no_id_anywhere_yields_none() {
        let body = json!({ "Success": true, "Message": "ok" });
        assert!(find_task_handle(&body).is_none());
    }

    #[test]
    fn float_task_id_rejected() {
        let body = json!({ "other": { "taskId": 77.5 } });
        assert!(find_task_handle(&body).is_none());
    }
}
