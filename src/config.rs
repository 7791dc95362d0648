use log::warn;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::common::DEFAULT_MAX_FILE_SIZE_BYTES;

/// Runtime tunables for the worker pool and the operations library.
///
/// Loaded once at bootstrap from the environment (`.env` is honored); every
/// field has a sensible default so a bare process still comes up.
#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    pub core_workers: usize,
    pub max_workers: usize,
    pub queue_capacity: usize,
    /// Queue depth at which the monitor scales the pool up.
    pub resize_threshold: usize,
    /// Workers above the core size exit after this long without work.
    pub idle_timeout: Duration,
    pub monitor_interval: Duration,
    pub storage_dir: PathBuf,
    pub max_file_size_bytes: u64,
    /// How long `shutdown()` waits for in-flight work to drain.
    pub shutdown_grace: Duration,
}

impl Default for ProcessingConfig {
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
            storage_dir: PathBuf::from("./storage"),
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

impl ProcessingConfig {
    /// Build the configuration from environment variables, falling back to
    /// defaults for anything absent or malformed. A typo'd variable must not
    /// kill the bootstrap, so parse failures only warn.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            core_workers: env_or("FILEFLOW_CORE_WORKERS", defaults.core_workers),
            max_workers: env_or("FILEFLOW_MAX_WORKERS", defaults.max_workers),
            queue_capacity: env_or("FILEFLOW_QUEUE_CAPACITY", defaults.queue_capacity),
            resize_threshold: env_or("FILEFLOW_RESIZE_THRESHOLD", defaults.resize_threshold),
            idle_timeout: Duration::from_secs(env_or(
                "FILEFLOW_IDLE_TIMEOUT_SECS",
                defaults.idle_timeout.as_secs(),
            )),
            monitor_interval: Duration::from_millis(env_or(
                "FILEFLOW_MONITOR_INTERVAL_MILLIS",
                defaults.monitor_interval.as_millis() as u64,
            )),
            storage_dir: std::env::var("FILEFLOW_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            max_file_size_bytes: env_or(
                "FILEFLOW_MAX_FILE_SIZE_BYTES",
                defaults.max_file_size_bytes,
            ),
            shutdown_grace: Duration::from_secs(env_or(
                "FILEFLOW_SHUTDOWN_GRACE_SECS",
                defaults.shutdown_grace.as_secs(),
            )),
        }
    }
}

fn env_or<T: FromStr + Copy>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Ignoring malformed {}: {:?}", name, raw);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_track_cpu_count() {
        let config = ProcessingConfig::default();
        assert!(config.core_workers >= 1);
        assert_eq!(config.max_workers, config.core_workers * 4);
        assert_eq!(config.queue_capacity, 200);
        assert_eq!(config.max_file_size_bytes, 100 * 1024 * 1024);
    }
}
