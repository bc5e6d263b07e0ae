//! Task identifiers recovered from submit responses.
//!
//! The service normally returns an all-digit task id that the status
//! endpoint accepts. Some response shapes only expose a request id or a
//! UUID-style value instead; those are kept as [`TaskIdKind::BestEffort`]
//! handles so callers can tell a pollable id from one that will be rejected
//! by the status endpoint.

use serde::Serialize;

/// How confident we are that an id is accepted by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskIdKind {
    /// All-digit id taken from a known task-id field.
    Numeric,
    /// Recovered from a request-id or generic id field; may not be pollable.
    BestEffort,
}

/// A task identifier together with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskHandle {
    pub id: String,
    pub kind: TaskIdKind,
}

impl TaskHandle {
    /// Build a handle for a known-good numeric id.
    pub fn numeric(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: TaskIdKind::Numeric,
        }
    }

    /// Build a handle for an id recovered from a fallback field.
    pub fn best_effort(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: TaskIdKind::BestEffort,
        }
    }

    /// Classify a caller-supplied id string: all digits means numeric,
    /// anything else (UUIDs included) is best-effort.
    pub fn classify(raw: impl Into<String>) -> Self {
        let id = raw.into();
        if is_numeric_id(&id) {
            Self::numeric(id)
        } else {
            Self::best_effort(id)
        }
    }

    /// Whether the status endpoint is expected to accept this id.
    pub fn is_pollable(&self) -> bool {
        self.kind == TaskIdKind::Numeric
    }
}

/// True if `s` is non-empty and consists solely of ASCII digits.
pub fn is_numeric_id(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_string_classifies_as_numeric() {
        let handle = TaskHandle::classify("778899");
        assert_eq!(handle.kind, TaskIdKind::Numeric);
        assert!(handle.is_pollable());
    }

    #[test]
    fn uuid_classifies_as_best_effort() {
        let handle = TaskHandle::classify("550e8400-e29b-41d4-a716-446655440000");
        assert_eq!(handle.kind, TaskIdKind::BestEffort);
        assert!(!handle.is_pollable());
    }

    #[test]
    fn empty_string_is_not_numeric() {
        assert!(!is_numeric_id(""));
    }

    #[test]
    fn mixed_alphanumeric_is_not_numeric() {
        assert!(!is_numeric_id("12ab34"));
    }
}
