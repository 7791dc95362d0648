use anyhow::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::completion::CompletionCell;
use crate::metrics::ProcessingMetrics;
use crate::models::{FileEntry, OperationOutcome, OperationSpec};

/// One (file, operation) unit of work.
///
/// Completion is idempotent: whichever of `complete` / `complete_exceptionally`
/// flips the set-once flag first decides the outcome, and metrics fire exactly
/// once per task no matter how many threads race on it.
pub struct FileTask {
    file: FileEntry,
    operation: OperationSpec,
    result: Arc<CompletionCell<OperationOutcome>>,
    completed: AtomicBool,
}

impl FileTask {
    pub fn new(file: FileEntry, operation: OperationSpec) -> Self {
        Self {
            file,
            operation,
            result: Arc::new(CompletionCell::new()),
            completed: AtomicBool::new(false),
        }
    }

    pub fn file(&self) -> &FileEntry {
        &self.file
    }

    pub fn operation(&self) -> &OperationSpec {
        &self.operation
    }

    /// The single-consumer handle for this task's result.
    pub fn handle(&self) -> Arc<CompletionCell<OperationOutcome>> {
        Arc::clone(&self.result)
    }

    pub fn is_done(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    pub fn is_failed(&self) -> bool {
        self.result.is_failed()
    }

    /// Record a result. No-op if the task already completed.
    pub fn complete(
        &self,
        outcome: OperationOutcome,
        metrics: &ProcessingMetrics,
        duration_millis: u64,
    ) {
        if self.try_claim() {
            self.result.complete(outcome);
            metrics.record_task_completion(duration_millis);
        }
    }

    /// Record a failure cause. No-op if the task already completed.
    pub fn complete_exceptionally(
        &self,
        cause: Error,
        metrics: &ProcessingMetrics,
        duration_millis: u64,
    ) {
        if self.try_claim() {
            self.result.fail(cause);
            metrics.increment_failed_tasks();
            metrics.record_task_completion(duration_millis);
        }
    }

    fn try_claim(&self) -> bool {
        self.completed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl std::fmt::Debug for FileTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileTask")
            .field("file_id", &self.file.id())
            .field("operation", &self.operation.kind())
            .field("done", &self.is_done())
            .finish()
    }
}
