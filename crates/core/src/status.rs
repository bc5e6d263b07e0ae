//! Canonical status taxonomy for remote generation tasks.
//!
//! The service reports status as a free-form uppercase string and is not
//! consistent about which synonym it uses (`SUCCEED`, `SUCCESS`, and
//! `COMPLETED` have all been observed for the same terminal state).
//! [`TaskStatus::parse`] folds every known synonym into one canonical value;
//! anything unrecognized becomes [`TaskStatus::Unknown`], which is treated as
//! non-terminal so a new status string never aborts a poll loop.

use std::fmt;

use serde::Serialize;

/// Canonical lifecycle states of a generation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Accepted but not yet queued.
    Pending,
    /// Waiting in the execution queue.
    Queuing,
    /// Actively rendering.
    Processing,
    /// Finished with results available.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Status string not recognized; treated as still in progress.
    Unknown,
}

impl TaskStatus {
    /// Fold a raw status string into its canonical value.
    ///
    /// Matching is case-insensitive and tolerant of surrounding whitespace.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" | "WAITING" => TaskStatus::Pending,
            "QUEUING" | "QUEUED" => TaskStatus::Queuing,
            "PROCESSING" | "RUNNING" => TaskStatus::Processing,
            "SUCCEED" | "SUCCESS" | "SUCCEEDED" | "COMPLETED" => TaskStatus::Succeeded,
            "FAILED" | "FAIL" | "ERROR" => TaskStatus::Failed,
            _ => TaskStatus::Unknown,
        }
    }

    /// Whether this status ends the poll loop.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }

    /// Canonical uppercase name, as used in API responses and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Queuing => "QUEUING",
            TaskStatus::Processing => "PROCESSING",
            TaskStatus::Succeeded => "SUCCEEDED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_synonyms_fold_to_succeeded() {
        assert_eq!(TaskStatus::parse("SUCCEED"), TaskStatus::Succeeded);
        assert_eq!(TaskStatus::parse("SUCCESS"), TaskStatus::Succeeded);
        assert_eq!(TaskStatus::parse("SUCCEEDED"), TaskStatus::Succeeded);
        assert_eq!(TaskStatus::parse("COMPLETED"), TaskStatus::Succeeded);
    }

    #[test]
    fn running_folds_to_processing() {
        assert_eq!(TaskStatus::parse("RUNNING"), TaskStatus::Processing);
        assert_eq!(TaskStatus::parse("PROCESSING"), TaskStatus::Processing);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(TaskStatus::parse("queuing"), TaskStatus::Queuing);
        assert_eq!(TaskStatus::parse(" Failed "), TaskStatus::Failed);
    }

    #[test]
    fn unrecognized_status_is_unknown_and_non_terminal() {
        let status = TaskStatus::parse("THROTTLED");
        assert_eq!(status, TaskStatus::Unknown);
        assert!(!status.is_terminal());
    }

    #[test]
    fn only_succeeded_and_failed_are_terminal() {
        assert!(TaskStatus::Succeeded.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Queuing.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
    }

    #[test]
    fn display_uses_canonical_uppercase() {
        assert_eq!(TaskStatus::Succeeded.to_string(), "SUCCEEDED");
        assert_eq!(TaskStatus::Unknown.to_string(), "UNKNOWN");
    }
}
