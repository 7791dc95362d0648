use anyhow::anyhow;
use chrono::Utc;
use log::{debug, error, info, warn};
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use super::completion::CompletionCell;
use super::pool::WorkerPool;
use super::task::FileTask;
use super::FileWorkflow;
use crate::config::ProcessingConfig;
use crate::metrics::ProcessingMetrics;
use crate::models::operation::{
    DEFAULT_CONVERSION_FORMAT, DEFAULT_RESIZE_MAX_HEIGHT, DEFAULT_RESIZE_MAX_WIDTH,
};
use crate::models::{
    FileEntry, OperationKind, OperationOutcome, OperationSpec, ProcessingRequest,
    ProcessingSummary,
};
use crate::operations;

/// Callback receiving each result in stream mode. Calls are serialized per
/// workflow; implementations never see two invocations at once.
pub type ResultSink = Box<dyn FnMut(OperationOutcome) + Send>;

/// Turns a [`ProcessingRequest`] into tasks, drives them through the pool and
/// delivers results either folded into a summary (batch) or pushed through a
/// sink as they complete (stream).
///
/// Failures are isolated per task: whatever an operation does, the other
/// tasks of the workflow keep running and the caller gets a complete picture.
pub struct WorkflowExecutor {
    pool: Arc<WorkerPool>,
    metrics: Arc<ProcessingMetrics>,
    config: Arc<ProcessingConfig>,
}

impl WorkflowExecutor {
    pub fn new(
        pool: Arc<WorkerPool>,
        metrics: Arc<ProcessingMetrics>,
        config: Arc<ProcessingConfig>,
    ) -> Self {
        Self {
            pool,
            metrics,
            config,
        }
    }

    pub fn metrics(&self) -> &Arc<ProcessingMetrics> {
        &self.metrics
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Batch mode: run every task and block until the whole workflow is done.
    ///
    /// Results are folded in submission order (file order × operation order).
    /// A request that expands to zero tasks yields the empty summary.
    pub fn process_workflow(&self, request: &ProcessingRequest) -> ProcessingSummary {
        let start_time = Instant::now();
        let tasks = self.expand_tasks(request);
        if tasks.is_empty() {
            return ProcessingSummary::empty();
        }

        let workflow = match FileWorkflow::new(tasks) {
            Ok(workflow) => workflow,
            Err(_) => return ProcessingSummary::empty(),
        };
        info!(
            "Submitting workflow {} with {} tasks",
            workflow.id(),
            workflow.total_tasks()
        );

        for task in workflow.tasks() {
            self.submit_task(Arc::clone(task), None);
        }

        let mut results = Vec::with_capacity(workflow.total_tasks());
        for task in workflow.tasks() {
            let outcome = match task.handle().wait() {
                Ok(outcome) => outcome,
                // The handle failed instead of carrying a result (rejected
                // submission or panic); fold it in as a failed outcome.
                Err(cause) => OperationOutcome::failure(
                    task.file().id(),
                    task.operation().kind(),
                    format!("Error: {cause}"),
                    Utc::now(),
                ),
            };
            results.push(outcome);
        }

        let duration = format!("{:?}", start_time.elapsed());
        info!(duration = &*duration; "Workflow {} complete", workflow.id());

        ProcessingSummary::from_results(request.files().len(), results)
    }

    /// Stream mode: deliver each result through `sink` as it completes.
    ///
    /// Delivery happens in completion order under a per-workflow lock, so the
    /// sink is never invoked concurrently. The returned handle settles once
    /// every task has been delivered; the caller does not block here.
    pub fn process_workflow_streamed(
        &self,
        request: &ProcessingRequest,
        sink: ResultSink,
    ) -> Arc<CompletionCell<()>> {
        let done = Arc::new(CompletionCell::new());
        let tasks = self.expand_tasks(request);
        if tasks.is_empty() {
            done.complete(());
            return done;
        }

        let workflow = match FileWorkflow::new(tasks) {
            Ok(workflow) => workflow,
            Err(_) => {
                done.complete(());
                return done;
            }
        };
        info!(
            "Streaming workflow {} with {} tasks",
            workflow.id(),
            workflow.total_tasks()
        );

        let sink = Arc::new(Mutex::new(sink));
        let remaining = Arc::new(AtomicUsize::new(workflow.total_tasks()));

        for task in workflow.tasks() {
            let delivery = StreamDelivery {
                sink: Arc::clone(&sink),
                remaining: Arc::clone(&remaining),
                done: Arc::clone(&done),
            };
            self.submit_task(Arc::clone(task), Some(delivery));
        }

        done
    }

    /// One task per (file, operation) pair, in request order. Files whose
    /// effective operation list is empty contribute nothing.
    fn expand_tasks(&self, request: &ProcessingRequest) -> Vec<Arc<FileTask>> {
        let mut tasks = Vec::new();
        for file in request.files() {
            for kind in request.operations_for(file.id()) {
                tasks.push(Arc::new(FileTask::new(
                    file.clone(),
                    OperationSpec::with_defaults(*kind),
                )));
            }
        }
        tasks
    }

    /// Submit one task to the pool. The worker closure owns the full task
    /// lifecycle: execute, settle the task exactly once, update metrics, and
    /// deliver to the stream sink when one is attached. Nothing it does can
    /// escape as a panic or abort sibling tasks.
    fn submit_task(&self, task: Arc<FileTask>, delivery: Option<StreamDelivery>) {
        self.metrics.increment_active_tasks();

        let metrics = Arc::clone(&self.metrics);
        let config = Arc::clone(&self.config);
        let worker_task = Arc::clone(&task);
        let worker_delivery = delivery.clone();

        let submitted = self.pool.submit(move || {
            let start = Instant::now();
            let attempt = catch_unwind(AssertUnwindSafe(|| {
                execute_operation(worker_task.file(), worker_task.operation(), &config)
            }));
            let duration = start.elapsed().as_millis() as u64;

            let outcome = match attempt {
                Ok(outcome) => outcome,
                Err(_) => {
                    error!(
                        "Task panicked for file {} op {}",
                        worker_task.file().id(),
                        worker_task.operation().kind()
                    );
                    let outcome = OperationOutcome::failure(
                        worker_task.file().id(),
                        worker_task.operation().kind(),
                        "Error: task panicked",
                        Utc::now(),
                    );
                    worker_task.complete_exceptionally(
                        anyhow!("task panicked"),
                        &metrics,
                        duration,
                    );
                    metrics.decrement_active_tasks();
                    if let Some(delivery) = worker_delivery {
                        delivery.deliver(outcome);
                    }
                    return;
                }
            };

            worker_task.complete(outcome.clone(), &metrics, duration);
            metrics.decrement_active_tasks();
            if let Some(delivery) = worker_delivery {
                delivery.deliver(outcome);
            }
        });

        if let Err(cause) = submitted {
            // The pool refused the work (shutdown); the task still has to
            // settle so batch callers unblock and streams terminate.
            warn!(
                "Submission rejected for file {} op {}: {}",
                task.file().id(),
                task.operation().kind(),
                cause
            );
            let outcome = OperationOutcome::failure(
                task.file().id(),
                task.operation().kind(),
                format!("Error: {cause}"),
                Utc::now(),
            );
            task.complete_exceptionally(cause, &self.metrics, 0);
            self.metrics.decrement_active_tasks();
            // The worker closure never ran, so the stream delivery (if any)
            // happens here on the caller thread.
            if let Some(delivery) = delivery {
                delivery.deliver(outcome);
            }
        }
    }
}

/// Per-workflow stream delivery state: the serialized sink, the countdown and
/// the handle to settle after the last result.
#[derive(Clone)]
struct StreamDelivery {
    sink: Arc<Mutex<ResultSink>>,
    remaining: Arc<AtomicUsize>,
    done: Arc<CompletionCell<()>>,
}

impl StreamDelivery {
    fn deliver(&self, outcome: OperationOutcome) {
        {
            let mut sink = self
                .sink
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if catch_unwind(AssertUnwindSafe(move || (*sink)(outcome))).is_err() {
                error!("Result sink panicked; continuing with remaining tasks");
            }
        }
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.done.complete(());
        }
    }
}

/// Map an operation kind onto the operations library and fold the outcome
/// (success or failure) into an [`OperationOutcome`]. Never panics on
/// operation errors; this is the task-level error isolation boundary.
fn execute_operation(
    file: &FileEntry,
    operation: &OperationSpec,
    config: &ProcessingConfig,
) -> OperationOutcome {
    let started_at = Utc::now();
    info!("Executing {} on file {}", operation.kind(), file.name());

    let attempt: operations::OpResult<Option<String>> = match operation.kind() {
        OperationKind::Validate => {
            operations::validate(file, config.max_file_size_bytes).map(|_| None)
        }
        OperationKind::MetadataExtraction => {
            let metadata = operations::extract_metadata(file);
            debug!(
                "Extracted metadata for {}: {}",
                file.name(),
                Value::Object(metadata)
            );
            Ok(None)
        }
        OperationKind::OcrTextExtraction => operations::perform_ocr(file).map(|text| {
            debug!("OCR for {}: {}", file.name(), text);
            None
        }),
        OperationKind::ImageResize => operations::resize_image(
            file,
            operation.int_param("maxWidth", DEFAULT_RESIZE_MAX_WIDTH),
            operation.int_param("maxHeight", DEFAULT_RESIZE_MAX_HEIGHT),
        )
        .map(|_| None),
        OperationKind::FileCompression => operations::compress(file)
            .map(|path| Some(path.display().to_string())),
        OperationKind::FormatConversion => operations::convert_format(
            file,
            operation.str_param("targetFormat", DEFAULT_CONVERSION_FORMAT),
        )
        .map(|_| None),
        OperationKind::Storage => operations::store(file, &config.storage_dir)
            .map(|path| Some(path.display().to_string())),
        OperationKind::Unknown => {
            warn!("Unknown operation requested for {}, skipping", file.name());
            Ok(None)
        }
    };

    match attempt {
        Ok(location) => OperationOutcome::success(
            file.id(),
            operation.kind(),
            "Operation completed successfully",
            started_at,
            location.unwrap_or_else(|| format!("/mock/location/{}", file.name())),
        ),
        Err(cause) => {
            error!(
                "Operation {} failed on file {}: {}",
                operation.kind(),
                file.name(),
                cause
            );
            OperationOutcome::failure(
                file.id(),
                operation.kind(),
                format!("Error: {cause}"),
                started_at,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OperationStatus;
    use crate::operations::transform::tests::png_file;
    use crate::workflow::pool::PoolConfig;
    use std::collections::HashMap;
    use std::time::Duration;

    fn test_executor() -> WorkflowExecutor {
        let storage = tempfile::tempdir().unwrap().into_path();
        let config = ProcessingConfig {
            storage_dir: storage,
            ..ProcessingConfig::default()
        };
        let pool = Arc::new(WorkerPool::new(PoolConfig {
            core_workers: 2,
            max_workers: 4,
            queue_capacity: 32,
            resize_threshold: 8,
            idle_timeout: Duration::from_millis(200),
            monitor_interval: Duration::from_millis(50),
            shutdown_grace: Duration::from_secs(5),
        }));
        WorkflowExecutor::new(pool, Arc::new(ProcessingMetrics::new()), Arc::new(config))
    }

    fn request(
        files: Vec<FileEntry>,
        defaults: Vec<OperationKind>,
    ) -> ProcessingRequest {
        ProcessingRequest::new(files, defaults, HashMap::new()).unwrap()
    }

    #[test]
    fn batch_mode_folds_results_in_submission_order() {
        let executor = test_executor();
        let request = request(
            vec![png_file("a", 2, 2), png_file("b", 2, 2)],
            vec![OperationKind::Validate, OperationKind::MetadataExtraction],
        );

        let summary = executor.process_workflow(&request);
        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.successful, 4);
        assert_eq!(summary.failed, 0);
        let order: Vec<(&str, OperationKind)> = summary
            .results
            .iter()
            .map(|r| (r.file_id.as_str(), r.operation))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a", OperationKind::Validate),
                ("a", OperationKind::MetadataExtraction),
                ("b", OperationKind::Validate),
                ("b", OperationKind::MetadataExtraction),
            ]
        );
    }

    #[test]
    fn failures_are_isolated_per_task() {
        let executor = test_executor();
        let bad = FileEntry::new("bad", "bad.xyz", Vec::new(), "xyz", 0);
        let request = request(
            vec![bad, png_file("good", 2, 2)],
            vec![OperationKind::Validate],
        );

        let summary = executor.process_workflow(&request);
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.failed, 1);
        let failed = &summary.results[0];
        assert_eq!(failed.status, OperationStatus::Failed);
        assert!(failed.details.contains("File is empty"));
        assert!(summary.results[1].is_success());
    }

    #[test]
    fn empty_operation_list_produces_an_empty_summary() {
        let executor = test_executor();
        let request = request(vec![png_file("a", 2, 2)], Vec::new());
        let summary = executor.process_workflow(&request);
        assert_eq!(summary.total_files, 0);
        assert!(summary.results.is_empty());
    }

    #[test]
    fn active_tasks_returns_to_zero_after_batch() {
        let executor = test_executor();
        let request = request(
            vec![png_file("a", 2, 2)],
            vec![OperationKind::Validate, OperationKind::FileCompression],
        );
        let summary = executor.process_workflow(&request);
        assert_eq!(summary.successful, 2);
        assert_eq!(executor.metrics().active_tasks(), 0);
        assert_eq!(executor.metrics().completed_tasks(), 2);
    }

    #[test]
    fn compression_result_carries_the_output_path() {
        let executor = test_executor();
        let request = request(
            vec![png_file("a", 2, 2)],
            vec![OperationKind::FileCompression],
        );
        let summary = executor.process_workflow(&request);
        let result = &summary.results[0];
        assert!(result.is_success());
        assert!(result.result_location.ends_with("a.png.gz"));
        assert!(std::path::Path::new(&result.result_location).exists());
    }

    #[test]
    fn mock_location_is_used_for_non_file_operations() {
        let executor = test_executor();
        let request = request(vec![png_file("a", 2, 2)], vec![OperationKind::Validate]);
        let summary = executor.process_workflow(&request);
        assert_eq!(summary.results[0].result_location, "/mock/location/a.png");
    }

    #[test]
    fn stream_mode_delivers_every_result_and_settles_the_handle() {
        let executor = test_executor();
        let request = request(
            vec![png_file("a", 2, 2), png_file("b", 2, 2)],
            vec![OperationKind::Validate, OperationKind::MetadataExtraction],
        );

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let handle = executor.process_workflow_streamed(
            &request,
            Box::new(move |outcome| {
                sink_seen.lock().unwrap().push(outcome);
            }),
        );

        handle.wait().unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        for file_id in ["a", "b"] {
            assert_eq!(seen.iter().filter(|o| o.file_id == file_id).count(), 2);
        }
        assert_eq!(executor.metrics().active_tasks(), 0);
    }

    #[test]
    fn stream_mode_with_no_tasks_settles_immediately() {
        let executor = test_executor();
        let request = request(vec![png_file("a", 2, 2)], Vec::new());
        let handle = executor.process_workflow_streamed(&request, Box::new(|_| {}));
        assert!(handle.is_done());
        handle.wait().unwrap();
    }

    #[test]
    fn sink_is_never_invoked_concurrently() {
        let executor = test_executor();
        let files: Vec<FileEntry> = (0..8).map(|i| png_file(&format!("f{i}"), 2, 2)).collect();
        let request = request(files, vec![OperationKind::Validate, OperationKind::MetadataExtraction]);

        let in_sink = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let handle = {
            let in_sink = Arc::clone(&in_sink);
            let overlaps = Arc::clone(&overlaps);
            executor.process_workflow_streamed(
                &request,
                Box::new(move |_| {
                    if in_sink.fetch_add(1, Ordering::AcqRel) != 0 {
                        overlaps.fetch_add(1, Ordering::AcqRel);
                    }
                    std::thread::sleep(Duration::from_millis(1));
                    in_sink.fetch_sub(1, Ordering::AcqRel);
                }),
            )
        };

        handle.wait().unwrap();
        assert_eq!(overlaps.load(Ordering::Acquire), 0);
    }

    #[test]
    fn a_panicking_sink_does_not_abort_the_stream() {
        let executor = test_executor();
        let request = request(
            vec![png_file("a", 2, 2), png_file("b", 2, 2)],
            vec![OperationKind::Validate],
        );

        let delivered = Arc::new(AtomicUsize::new(0));
        let handle = {
            let delivered = Arc::clone(&delivered);
            executor.process_workflow_streamed(
                &request,
                Box::new(move |_| {
                    if delivered.fetch_add(1, Ordering::AcqRel) == 0 {
                        panic!("sink rejects the first result");
                    }
                }),
            )
        };

        handle.wait().unwrap();
        assert_eq!(delivered.load(Ordering::Acquire), 2);
    }

    #[test]
    fn unknown_operation_is_skipped_as_success() {
        let config = ProcessingConfig::default();
        let file = png_file("a", 2, 2);
        let outcome = execute_operation(
            &file,
            &OperationSpec::with_defaults(OperationKind::Unknown),
            &config,
        );
        assert!(outcome.is_success());
    }

    #[test]
    fn resize_uses_request_parameters_over_defaults() {
        let config = ProcessingConfig::default();
        let file = png_file("a", 40, 40);
        let mut params = serde_json::Map::new();
        params.insert("maxWidth".into(), 10.into());
        params.insert("maxHeight".into(), 10.into());
        let outcome = execute_operation(
            &file,
            &OperationSpec::new(OperationKind::ImageResize, params),
            &config,
        );
        assert!(outcome.is_success());
    }
}
