use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::operation::OperationKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Success,
    Failed,
}

/// The outcome of one (file, operation) execution.
///
/// Timestamps default to now when a constructor does not receive them;
/// `finished_at` earlier than `started_at` is treated as a zero duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcome {
    pub file_id: String,
    pub operation: OperationKind,
    pub status: OperationStatus,
    pub details: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub result_location: String,
}

impl OperationOutcome {
    pub fn success(
        file_id: impl Into<String>,
        operation: OperationKind,
        details: impl Into<String>,
        started_at: DateTime<Utc>,
        result_location: impl Into<String>,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            operation,
            status: OperationStatus::Success,
            details: details.into(),
            started_at,
            finished_at: Utc::now(),
            result_location: result_location.into(),
        }
    }

    pub fn failure(
        file_id: impl Into<String>,
        operation: OperationKind,
        details: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            operation,
            status: OperationStatus::Failed,
            details: details.into(),
            started_at,
            finished_at: Utc::now(),
            result_location: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OperationStatus::Success
    }

    pub fn duration_millis(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn duration_never_negative() {
        let now = Utc::now();
        let mut outcome =
            OperationOutcome::success("f1", OperationKind::Validate, "ok", now, "/tmp/out");
        outcome.finished_at = now - Duration::seconds(5);
        assert_eq!(outcome.duration_millis(), 0);

        outcome.finished_at = now + Duration::milliseconds(250);
        assert_eq!(outcome.duration_millis(), 250);
    }

    #[test]
    fn failure_has_empty_location() {
        let outcome =
            OperationOutcome::failure("f1", OperationKind::Storage, "Error: disk full", Utc::now());
        assert_eq!(outcome.status, OperationStatus::Failed);
        assert!(outcome.result_location.is_empty());
    }
}
