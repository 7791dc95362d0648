//! The concurrent workflow execution layer.
//!
//! A request expands into one [`FileTask`] per (file, operation) pair; tasks
//! run on the [`WorkerPool`] and settle their [`CompletionCell`] exactly once.
//! The [`WorkflowExecutor`] drives the whole thing in either batch or
//! streaming mode.

pub mod completion;
pub mod executor;
pub mod pool;
pub mod task;

pub use completion::CompletionCell;
pub use executor::WorkflowExecutor;
pub use pool::{PoolConfig, WorkerPool};
pub use task::FileTask;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// The set of tasks derived from one request.
///
/// The task list is fixed at construction; progress is read straight from the
/// task states, so the counts are always current without extra bookkeeping.
pub struct FileWorkflow {
    id: String,
    tasks: Vec<Arc<FileTask>>,
    submitted_at: DateTime<Utc>,
}

impl FileWorkflow {
    pub fn new(tasks: Vec<Arc<FileTask>>) -> Result<Self> {
        if tasks.is_empty() {
            bail!("workflow must contain at least one task");
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            tasks,
            submitted_at: Utc::now(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tasks(&self) -> &[Arc<FileTask>] {
        &self.tasks
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn total_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn completed_tasks(&self) -> usize {
        self.tasks.iter().filter(|task| task.is_done()).count()
    }

    pub fn failed_tasks(&self) -> usize {
        self.tasks
            .iter()
            .filter(|task| task.is_done() && task.is_failed())
            .count()
    }
}
