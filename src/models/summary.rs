use serde::{Deserialize, Serialize};

use super::result::OperationOutcome;

/// Aggregated result of a whole workflow.
///
/// `successful + failed` counts operation outcomes, not files, so the sum can
/// exceed `total_files` when a file runs more than one operation. The field
/// name is kept for wire compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingSummary {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<OperationOutcome>,
}

impl ProcessingSummary {
    /// Fold a result list into a summary; the counts are derived from the
    /// results so they cannot drift out of sync.
    pub fn from_results(total_files: usize, results: Vec<OperationOutcome>) -> Self {
        let successful = results.iter().filter(|r| r.is_success()).count();
        let failed = results.len() - successful;
        Self {
            total_files,
            successful,
            failed,
            results,
        }
    }

    pub fn empty() -> Self {
        Self {
            total_files: 0,
            successful: 0,
            failed: 0,
            results: Vec::new(),
        }
    }
}
