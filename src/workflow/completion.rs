use anyhow::{anyhow, Error, Result};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

const PENDING: u8 = 0;
const SUCCEEDED: u8 = 1;
const FAILED: u8 = 2;

enum Slot<T> {
    Pending,
    Ready(Result<T>),
    Taken,
}

/// A set-once result cell with a blocking, single-consumer take.
///
/// The first `complete`/`fail` wins and wakes every waiter; later attempts are
/// ignored. `wait` hands the value out exactly once; a second consumer gets an
/// error instead of blocking forever.
pub struct CompletionCell<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
    // Mirrors the slot so is_done/is_failed never touch the lock.
    state: AtomicU8,
}

impl<T> Default for CompletionCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CompletionCell<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Pending),
            ready: Condvar::new(),
            state: AtomicU8::new(PENDING),
        }
    }

    /// Set the value. Returns whether this call won the race to complete.
    pub fn complete(&self, value: T) -> bool {
        self.settle(Ok(value), SUCCEEDED)
    }

    /// Mark the cell failed. Returns whether this call won the race.
    pub fn fail(&self, error: Error) -> bool {
        self.settle(Err(error), FAILED)
    }

    fn settle(&self, result: Result<T>, outcome: u8) -> bool {
        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !matches!(*slot, Slot::Pending) {
            return false;
        }
        *slot = Slot::Ready(result);
        self.state.store(outcome, Ordering::Release);
        self.ready.notify_all();
        true
    }

    pub fn is_done(&self) -> bool {
        self.state.load(Ordering::Acquire) != PENDING
    }

    pub fn is_failed(&self) -> bool {
        self.state.load(Ordering::Acquire) == FAILED
    }

    /// Block until the cell settles and take its value.
    pub fn wait(&self) -> Result<T> {
        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        loop {
            match std::mem::replace(&mut *slot, Slot::Taken) {
                Slot::Ready(result) => return result,
                Slot::Taken => return Err(anyhow!("result was already consumed")),
                Slot::Pending => {
                    *slot = Slot::Pending;
                    slot = self
                        .ready
                        .wait(slot)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                }
            }
        }
    }

    /// Like `wait`, but gives up after `timeout`. `None` means the cell is
    /// still pending; the value stays in place for a later consumer.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T>> {
        let deadline = std::time::Instant::now() + timeout;
        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        loop {
            match std::mem::replace(&mut *slot, Slot::Taken) {
                Slot::Ready(result) => return Some(result),
                Slot::Taken => return Some(Err(anyhow!("result was already consumed"))),
                Slot::Pending => {
                    *slot = Slot::Pending;
                    let remaining = deadline.saturating_duration_since(std::time::Instant::now());
                    if remaining.is_zero() {
                        return None;
                    }
                    let (guard, _) = self
                        .ready
                        .wait_timeout(slot, remaining)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    slot = guard;
                }
            }
        }
    }
}
