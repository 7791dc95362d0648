use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for the processing service.
///
/// Two categories with the same shape: task-level (one per operation
/// execution) and request-level (one per incoming call). Every update is a
/// single atomic operation; there is no happens-before relationship between
/// different counters, and none is needed by the consumers.
#[derive(Debug, Default)]
pub struct ProcessingMetrics {
    active_tasks: AtomicU64,
    total_task_duration_millis: AtomicU64,
    completed_tasks: AtomicU64,
    failed_tasks: AtomicU64,

    active_requests: AtomicU64,
    total_request_duration_millis: AtomicU64,
    completed_requests: AtomicU64,
    failed_requests: AtomicU64,
}

impl ProcessingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    // ────────────────────────────────────────────────────────────────
    // Task-level
    // ────────────────────────────────────────────────────────────────

    pub fn increment_active_tasks(&self) {
        self.active_tasks.fetch_add(1, Ordering::AcqRel);
    }

    /// Saturating decrement: the gauge never goes below zero.
    pub fn decrement_active_tasks(&self) {
        let _ = self
            .active_tasks
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_sub(1));
    }

    pub fn record_task_completion(&self, duration_millis: u64) {
        self.total_task_duration_millis
            .fetch_add(duration_millis, Ordering::AcqRel);
        self.completed_tasks.fetch_add(1, Ordering::AcqRel);
    }

    pub fn increment_failed_tasks(&self) {
        self.failed_tasks.fetch_add(1, Ordering::AcqRel);
    }

    pub fn active_tasks(&self) -> u64 {
        self.active_tasks.load(Ordering::Acquire)
    }

    pub fn completed_tasks(&self) -> u64 {
        self.completed_tasks.load(Ordering::Acquire)
    }

    pub fn failed_tasks(&self) -> u64 {
        self.failed_tasks.load(Ordering::Acquire)
    }

    pub fn average_task_duration_millis(&self) -> u64 {
        average(
            self.total_task_duration_millis.load(Ordering::Acquire),
            self.completed_tasks.load(Ordering::Acquire),
        )
    }

    // ────────────────────────────────────────────────────────────────
    // Request-level
    // ────────────────────────────────────────────────────────────────

    pub fn increment_active_requests(&self) {
        self.active_requests.fetch_add(1, Ordering::AcqRel);
    }

    pub fn decrement_active_requests(&self) {
        let _ = self
            .active_requests
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_sub(1));
    }

    pub fn record_request_completion(&self, duration_millis: u64) {
        self.total_request_duration_millis
            .fetch_add(duration_millis, Ordering::AcqRel);
        self.completed_requests.fetch_add(1, Ordering::AcqRel);
    }

    pub fn increment_failed_requests(&self) {
        self.failed_requests.fetch_add(1, Ordering::AcqRel);
    }

    pub fn active_requests(&self) -> u64 {
        self.active_requests.load(Ordering::Acquire)
    }

    pub fn completed_requests(&self) -> u64 {
        self.completed_requests.load(Ordering::Acquire)
    }

    pub fn failed_requests(&self) -> u64 {
        self.failed_requests.load(Ordering::Acquire)
    }

    pub fn average_request_duration_millis(&self) -> u64 {
        average(
            self.total_request_duration_millis.load(Ordering::Acquire),
            self.completed_requests.load(Ordering::Acquire),
        )
    }

    /// Zero every counter. Each store is atomic; a concurrent observer may see
    /// a mix of old and new values across counters, which is acceptable for a
    /// dashboard refresh.
    pub fn reset(&self) {
        self.active_tasks.store(0, Ordering::Release);
        self.total_task_duration_millis.store(0, Ordering::Release);
        self.completed_tasks.store(0, Ordering::Release);
        self.failed_tasks.store(0, Ordering::Release);
        self.active_requests.store(0, Ordering::Release);
        self.total_request_duration_millis.store(0, Ordering::Release);
        self.completed_requests.store(0, Ordering::Release);
        self.failed_requests.store(0, Ordering::Release);
    }

    /// All named values, for the metrics endpoint and for logging.
    pub fn snapshot(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("activeTasks".into(), self.active_tasks().into());
        map.insert("completedTasks".into(), self.completed_tasks().into());
        map.insert("failedTasks".into(), self.failed_tasks().into());
        map.insert(
            "averageTaskDurationMillis".into(),
            self.average_task_duration_millis().into(),
        );
        map.insert("activeRequests".into(), self.active_requests().into());
        map.insert("completedRequests".into(), self.completed_requests().into());
        map.insert("failedRequests".into(), self.failed_requests().into());
        map.insert(
            "averageRequestDurationMillis".into(),
            self.average_request_duration_millis().into(),
        );
        map
    }
}

fn average(total: u64, completed: u64) -> u64 {
    if completed == 0 {
        0
    } else {
        total / completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn average_is_zero_without_completions() {
        let metrics = ProcessingMetrics::new();
        assert_eq!(metrics.average_task_duration_millis(), 0);
        metrics.record_task_completion(30);
        metrics.record_task_completion(10);
        assert_eq!(metrics.average_task_duration_millis(), 20);
    }

    #[test]
    fn active_gauge_never_goes_negative() {
        let metrics = ProcessingMetrics::new();
        metrics.decrement_active_tasks();
        assert_eq!(metrics.active_tasks(), 0);
        metrics.increment_active_tasks();
        metrics.decrement_active_tasks();
        metrics.decrement_active_tasks();
        assert_eq!(metrics.active_tasks(), 0);
    }

    #[test]
    fn reset_zeroes_everything() {
        let metrics = ProcessingMetrics::new();
        metrics.increment_active_tasks();
        metrics.record_task_completion(5);
        metrics.increment_failed_tasks();
        metrics.increment_active_requests();
        metrics.record_request_completion(7);
        metrics.increment_failed_requests();

        metrics.reset();
        for (_, value) in metrics.snapshot() {
            assert_eq!(value, Value::from(0u64));
        }
    }

    #[test]
    fn snapshot_contains_all_metric_names() {
        let snapshot = ProcessingMetrics::new().snapshot();
        for name in [
            "activeTasks",
            "completedTasks",
            "failedTasks",
            "averageTaskDurationMillis",
            "activeRequests",
            "completedRequests",
            "failedRequests",
            "averageRequestDurationMillis",
        ] {
            assert!(snapshot.contains_key(name), "missing {name}");
        }
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let metrics = Arc::new(ProcessingMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.increment_active_tasks();
                        metrics.record_task_completion(1);
                        metrics.decrement_active_tasks();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.completed_tasks(), 8000);
        assert_eq!(metrics.active_tasks(), 0);
        assert_eq!(metrics.average_task_duration_millis(), 1);
    }
}
