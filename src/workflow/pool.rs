use anyhow::{anyhow, bail, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{error, info, warn};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::completion::CompletionCell;
use crate::config::ProcessingConfig;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Sizing knobs for a [`WorkerPool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub core_workers: usize,
    pub max_workers: usize,
    pub queue_capacity: usize,
    pub resize_threshold: usize,
    pub idle_timeout: Duration,
    pub monitor_interval: Duration,
    pub shutdown_grace: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            core_workers: cpus,
            max_workers: cpus * 4,
            queue_capacity: 200,
            resize_threshold: 50,
            idle_timeout: Duration::from_secs(60),
            monitor_interval: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

impl From<&ProcessingConfig> for PoolConfig {
    fn from(config: &ProcessingConfig) -> Self {
        Self {
            core_workers: config.core_workers.max(1),
            max_workers: config.max_workers.max(config.core_workers.max(1)),
            queue_capacity: config.queue_capacity.max(1),
            resize_threshold: config.resize_threshold,
            idle_timeout: config.idle_timeout,
            monitor_interval: config.monitor_interval,
            shutdown_grace: config.shutdown_grace,
        }
    }
}

struct PoolState {
    config: PoolConfig,
    // Sender lives behind a lock so shutdown can drop it; dropping closes the
    // channel and lets blocked workers drain out.
    sender: Mutex<Option<Sender<Job>>>,
    receiver: Receiver<Job>,
    /// Adaptive core target; never below `config.core_workers`.
    core_size: AtomicUsize,
    /// Adaptive ceiling; never above `config.max_workers`.
    max_size: AtomicUsize,
    live_workers: AtomicUsize,
    busy_workers: AtomicUsize,
    next_worker_id: AtomicUsize,
    shutting_down: AtomicBool,
}

/// Bounded-queue executor with adaptive sizing and caller-runs backpressure.
///
/// This is the only place the crate creates threads. Work that cannot be
/// queued runs inline on the submitting thread, so overload slows producers
/// down instead of buffering without bound. A monitor thread widens the pool
/// when the queue backs up and narrows it again when the queue drains.
pub struct WorkerPool {
    state: Arc<PoolState>,
    monitor_stop: Sender<()>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(config: PoolConfig) -> Self {
        let (sender, receiver) = bounded(config.queue_capacity);
        // The adaptive window opens at twice the core size so the monitor has
        // room to widen toward the hard ceiling under sustained pressure and
        // to shrink back once the queue drains.
        let initial_max = (config.core_workers * 2)
            .min(config.max_workers)
            .max(config.core_workers);
        let state = Arc::new(PoolState {
            core_size: AtomicUsize::new(config.core_workers),
            max_size: AtomicUsize::new(initial_max),
            sender: Mutex::new(Some(sender)),
            receiver,
            live_workers: AtomicUsize::new(0),
            busy_workers: AtomicUsize::new(0),
            next_worker_id: AtomicUsize::new(0),
            shutting_down: AtomicBool::new(false),
            config,
        });

        let (monitor_stop, stop_signal) = unbounded();
        let monitor = {
            let state = Arc::clone(&state);
            thread::Builder::new()
                .name("file-task-pool-monitor".to_string())
                .spawn(move || monitor_loop(&state, &stop_signal))
                .ok()
        };
        if monitor.is_none() {
            error!("Failed to spawn pool monitor; adaptive sizing disabled");
        }

        Self {
            state,
            monitor_stop,
            monitor: Mutex::new(monitor),
        }
    }

    /// Submit a unit of work and get a handle that settles when it has run.
    ///
    /// When the queue is full and the pool cannot grow, the work runs inline
    /// on the calling thread before this returns (caller-runs backpressure).
    /// Fails only when the pool has been shut down.
    pub fn submit<F>(&self, work: F) -> Result<Arc<CompletionCell<()>>>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.state.shutting_down.load(Ordering::Acquire) {
            bail!("worker pool is shut down");
        }

        let handle = Arc::new(CompletionCell::new());
        let job = wrap_job(work, Arc::clone(&handle));

        // Lazily grow to the core size before queueing anything.
        spawn_worker_if(&self.state, |live, core, _| live < core);

        let sender = {
            let guard = self
                .state
                .sender
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match guard.as_ref() {
                Some(sender) => sender.clone(),
                None => bail!("worker pool is shut down"),
            }
        };

        match sender.try_send(job) {
            Ok(()) => {
                // Queue accepted but every worker is busy: widen toward the
                // adaptive ceiling so the backlog gets picked up.
                if self.state.busy_workers.load(Ordering::Acquire)
                    >= self.state.live_workers.load(Ordering::Acquire)
                {
                    spawn_worker_if(&self.state, |live, _, max| live < max);
                }
                // Lost a race with shutdown and every worker already left:
                // drain the queue here so no handle is stranded.
                if self.state.shutting_down.load(Ordering::Acquire)
                    && self.state.live_workers.load(Ordering::Acquire) == 0
                {
                    while let Ok(job) = self.state.receiver.try_recv() {
                        run_inline(job);
                    }
                }
                Ok(handle)
            }
            Err(TrySendError::Full(job)) => {
                if spawn_worker_if(&self.state, |live, _, max| live < max) {
                    match sender.try_send(job) {
                        Ok(()) => return Ok(handle),
                        Err(TrySendError::Full(job)) => {
                            run_inline(job);
                            return Ok(handle);
                        }
                        Err(TrySendError::Disconnected(_)) => {
                            bail!("worker pool is shut down")
                        }
                    }
                }
                run_inline(job);
                Ok(handle)
            }
            Err(TrySendError::Disconnected(_)) => bail!("worker pool is shut down"),
        }
    }

    /// Workers currently executing a job.
    pub fn active_workers(&self) -> usize {
        self.state.busy_workers.load(Ordering::Acquire)
    }

    /// Threads currently alive in the pool, busy or idle.
    pub fn live_workers(&self) -> usize {
        self.state.live_workers.load(Ordering::Acquire)
    }

    pub fn queue_depth(&self) -> usize {
        self.state.receiver.len()
    }

    /// Stop accepting work, wait for the backlog to drain, then let go.
    ///
    /// Queued work is still executed; the wait is bounded by the configured
    /// grace period, after which remaining workers are detached and finish (or
    /// not) on their own. Safe to call more than once.
    pub fn shutdown(&self) {
        if self.state.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }

        let _ = self.monitor_stop.send(());
        if let Some(handle) = self
            .monitor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            let _ = handle.join();
        }

        // Closing the channel wakes blocked workers; they drain what is queued
        // and exit on disconnect.
        self.state
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        let deadline = Instant::now() + self.state.config.shutdown_grace;
        while self.state.live_workers.load(Ordering::Acquire) > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        let leftover = self.state.live_workers.load(Ordering::Acquire);
        if leftover > 0 {
            warn!(
                "Pool shutdown grace expired with {} workers still running; detaching",
                leftover
            );
        } else {
            info!("Worker pool shut down cleanly");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn wrap_job<F>(work: F, handle: Arc<CompletionCell<()>>) -> Job
where
    F: FnOnce() + Send + 'static,
{
    Box::new(move || {
        match catch_unwind(AssertUnwindSafe(work)) {
            Ok(()) => {
                handle.complete(());
            }
            Err(_) => {
                error!("Pool job panicked; worker thread continues");
                handle.fail(anyhow!("pool job panicked"));
            }
        };
    })
}

fn run_inline(job: Job) {
    job();
}

/// Spawn one worker if `condition(live, core, max)` still holds after the live
/// count is optimistically claimed. Returns whether a worker was spawned.
fn spawn_worker_if<C>(state: &Arc<PoolState>, condition: C) -> bool
where
    C: Fn(usize, usize, usize) -> bool,
{
    loop {
        let live = state.live_workers.load(Ordering::Acquire);
        let core = state.core_size.load(Ordering::Acquire);
        let max = state.max_size.load(Ordering::Acquire);
        if state.shutting_down.load(Ordering::Acquire) || !condition(live, core, max) {
            return false;
        }
        if state
            .live_workers
            .compare_exchange(live, live + 1, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            continue;
        }

        let id = state.next_worker_id.fetch_add(1, Ordering::AcqRel) + 1;
        let worker_state = Arc::clone(state);
        let spawned = thread::Builder::new()
            .name(format!("file-task-thread-{id}"))
            .spawn(move || worker_loop(&worker_state));
        match spawned {
            Ok(_) => return true,
            Err(err) => {
                state.live_workers.fetch_sub(1, Ordering::AcqRel);
                error!("Failed to spawn worker thread: {err}");
                return false;
            }
        }
    }
}

fn worker_loop(state: &Arc<PoolState>) {
    loop {
        match state.receiver.recv_timeout(state.config.idle_timeout) {
            Ok(job) => {
                state.busy_workers.fetch_add(1, Ordering::AcqRel);
                job();
                state.busy_workers.fetch_sub(1, Ordering::AcqRel);
            }
            Err(RecvTimeoutError::Timeout) => {
                // Idle workers above the (adaptive) core size expire.
                if state.live_workers.load(Ordering::Acquire)
                    > state.core_size.load(Ordering::Acquire)
                    || state.shutting_down.load(Ordering::Acquire)
                {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    state.live_workers.fetch_sub(1, Ordering::AcqRel);
}

fn monitor_loop(state: &Arc<PoolState>, stop: &Receiver<()>) {
    loop {
        match stop.recv_timeout(state.config.monitor_interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => adjust_pool_size(state),
        }
    }
}

/// Adaptive resizing driven by queue depth.
fn adjust_pool_size(state: &Arc<PoolState>) {
    let depth = state.receiver.len();
    let core = state.core_size.load(Ordering::Acquire);
    let max = state.max_size.load(Ordering::Acquire);
    let config = &state.config;

    if depth > config.resize_threshold && max < config.max_workers {
        let new_max = (max + 2).min(config.max_workers);
        let new_core = (new_max / 2).max(config.core_workers);
        state.max_size.store(new_max, Ordering::Release);
        state.core_size.store(new_core, Ordering::Release);
        info!("Increased pool size to {} (core {})", new_max, new_core);
        // A wider core is only useful if threads exist to drain the backlog.
        while state.receiver.len() > 0 && spawn_worker_if(state, |live, core, _| live < core) {}
    } else if depth < config.resize_threshold / 2 && core > config.core_workers {
        let new_core = (core - 1).max(config.core_workers);
        state.core_size.store(new_core, Ordering::Release);
        state.max_size.store(new_core * 2, Ordering::Release);
        info!("Decreased pool size to {}", new_core);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;

    fn small_pool(core: usize, max: usize, capacity: usize) -> WorkerPool {
        WorkerPool::new(PoolConfig {
            core_workers: core,
            max_workers: max,
            queue_capacity: capacity,
            resize_threshold: 50,
            idle_timeout: Duration::from_millis(200),
            monitor_interval: Duration::from_millis(20),
            shutdown_grace: Duration::from_secs(5),
        })
    }

    #[test]
    fn runs_submitted_work() {
        let pool = small_pool(2, 4, 16);
        let counter = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let counter = Arc::clone(&counter);
                pool.submit(move || {
                    counter.fetch_add(1, Ordering::AcqRel);
                })
                .unwrap()
            })
            .collect();
        for handle in handles {
            handle.wait().unwrap();
        }
        assert_eq!(counter.load(Ordering::Acquire), 32);
        pool.shutdown();
    }

    #[test]
    fn full_queue_runs_on_the_caller_thread() {
        let pool = small_pool(1, 1, 4);

        // Occupy the only worker until released.
        let (release, gate) = mpsc::channel::<()>();
        let blocker = pool
            .submit(move || {
                let _ = gate.recv();
            })
            .unwrap();
        while pool.active_workers() == 0 {
            thread::sleep(Duration::from_millis(1));
        }

        let caller = thread::current().id();
        let inline_runs = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let inline_runs = Arc::clone(&inline_runs);
            handles.push(
                pool.submit(move || {
                    if thread::current().id() == caller {
                        inline_runs.fetch_add(1, Ordering::AcqRel);
                    }
                })
                .unwrap(),
            );
        }

        // Four fit in the queue; the other four must have run inline already.
        assert!(inline_runs.load(Ordering::Acquire) >= 4);

        release.send(()).unwrap();
        blocker.wait().unwrap();
        for handle in handles {
            handle.wait().unwrap();
        }
        pool.shutdown();
    }

    #[test]
    fn worker_threads_carry_the_pool_name() {
        let pool = small_pool(1, 2, 4);
        let name = Arc::new(Mutex::new(String::new()));
        let handle = {
            let name = Arc::clone(&name);
            pool.submit(move || {
                let current = thread::current();
                *name.lock().unwrap() = current.name().unwrap_or("").to_string();
            })
            .unwrap()
        };
        handle.wait().unwrap();
        assert!(name.lock().unwrap().starts_with("file-task-thread-"));
        pool.shutdown();
    }

    #[test]
    fn shutdown_rejects_new_work_and_is_idempotent() {
        let pool = small_pool(1, 2, 4);
        let ran = Arc::new(AtomicUsize::new(0));
        {
            let ran = Arc::clone(&ran);
            pool.submit(move || {
                ran.fetch_add(1, Ordering::AcqRel);
            })
            .unwrap()
            .wait()
            .unwrap();
        }

        pool.shutdown();
        pool.shutdown();
        assert!(pool.submit(|| {}).is_err());
        assert_eq!(ran.load(Ordering::Acquire), 1);
        assert_eq!(pool.live_workers(), 0);
    }

    #[test]
    fn shutdown_drains_queued_work() {
        let pool = small_pool(1, 1, 16);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                thread::sleep(Duration::from_millis(2));
                counter.fetch_add(1, Ordering::AcqRel);
            })
            .unwrap();
        }
        pool.shutdown();
        assert_eq!(counter.load(Ordering::Acquire), 10);
    }

    #[test]
    fn a_panicking_job_fails_its_handle_but_not_the_pool() {
        let pool = small_pool(1, 1, 4);
        let bad = pool.submit(|| panic!("job blew up")).unwrap();
        assert!(bad.wait().is_err());

        let good = pool.submit(|| {}).unwrap();
        good.wait().unwrap();
        pool.shutdown();
    }

    #[test]
    fn monitor_scales_up_under_queue_pressure() {
        let pool = WorkerPool::new(PoolConfig {
            core_workers: 1,
            max_workers: 8,
            queue_capacity: 64,
            resize_threshold: 4,
            idle_timeout: Duration::from_millis(500),
            monitor_interval: Duration::from_millis(10),
            shutdown_grace: Duration::from_secs(5),
        });

        // Deep backlog of slow jobs.
        let mut handles = Vec::new();
        for _ in 0..40 {
            handles.push(
                pool.submit(|| thread::sleep(Duration::from_millis(20)))
                    .unwrap(),
            );
        }

        let deadline = Instant::now() + Duration::from_secs(2);
        while pool.live_workers() <= 1 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(
            pool.live_workers() > 1,
            "monitor never scaled the pool up under pressure"
        );

        for handle in handles {
            handle.wait().unwrap();
        }
        pool.shutdown();
    }
}
