//! # Global executor configuration.
//!
//! Provides [`Config`] centralized settings for schedulers and executors.
//!
//! Config is used in two ways:
//! 1. **Scheduler creation**: `Schedulers::new(&config)` sizes the io pool and names threads
//! 2. **Executor creation**: `TaskExecutor::builder(&schedulers).config(config)` picks the
//!    bus capacity, progress throttle and default failure policy
//!
//! ## Sentinel values
//! - `io_threads = 0` → `2 × available_parallelism` (oversubscribed for blocking bodies)
//! - `io_max_concurrent = 0` → unlimited (no admission semaphore created)
//! - `progress_interval = 0s` → progress updates are never throttled

use std::num::NonZeroUsize;
use std::time::Duration;

use crate::policies::FailurePolicy;

/// Global configuration for schedulers and executors.
///
/// ## Field semantics
/// - `io_threads`: worker threads of the io runtime (`0` = derived from CPU count)
/// - `io_max_concurrent`: jobs admitted to run at once on io (`0` = unlimited)
/// - `thread_name`: prefix for scheduler threads (`<prefix>-io`, `<prefix>-ui`)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `progress_interval`: minimum delay between two published progress updates of one task
/// - `failure_policy`: how an executor with several roots reports failures
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Worker threads of the io scheduler.
    ///
    /// - `0` = twice the available parallelism
    /// - `n > 0` = exactly `n` workers
    pub io_threads: usize,

    /// Maximum number of io jobs running at once.
    ///
    /// - `0` = unlimited (no semaphore)
    /// - `n > 0` = further jobs wait for a permit; admission blocks, it never fails
    pub io_max_concurrent: usize,

    /// Prefix for scheduler thread names.
    pub thread_name: String,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,

    /// Minimum interval between two published progress updates of the same task.
    ///
    /// The final update of a task (`done == total`) is always published.
    pub progress_interval: Duration,

    /// Default failure policy for executors with several roots.
    pub failure_policy: FailurePolicy,
}

impl Config {
    /// Returns the number of io worker threads to spawn.
    #[inline]
    pub fn io_worker_threads(&self) -> usize {
        if self.io_threads == 0 {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(2)
                * 2
        } else {
            self.io_threads
        }
    }

    /// Returns the io admission limit as an `Option`.
    ///
    /// - `None` → unlimited (no semaphore)
    /// - `Some(n)` → at most `n` concurrent io jobs
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.io_max_concurrent == 0 {
            None
        } else {
            Some(self.io_max_concurrent)
        }
    }

    /// Returns the progress throttle as an `Option`.
    ///
    /// - `None` → every update is published
    /// - `Some(d)` → at most one update per `d` per task
    #[inline]
    pub fn progress_throttle(&self) -> Option<Duration> {
        if self.progress_interval == Duration::ZERO {
            None
        } else {
            Some(self.progress_interval)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    ///
    /// The `Bus` should use this value to avoid constructing an invalid channel.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `io_threads = 0` (2 × CPU count)
    /// - `io_max_concurrent = 0` (unlimited)
    /// - `thread_name = "taskgraph"`
    /// - `bus_capacity = 1024`
    /// - `progress_interval = 1s`
    /// - `failure_policy = FailurePolicy::FailFast`
    fn default() -> Self {
        Self {
            io_threads: 0,
            io_max_concurrent: 0,
            thread_name: "taskgraph".to_string(),
            bus_capacity: 1024,
            progress_interval: Duration::from_secs(1),
            failure_policy: FailurePolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sentinels() {
        let cfg = Config {
            io_threads: 0,
            io_max_concurrent: 0,
            progress_interval: Duration::ZERO,
            bus_capacity: 0,
            ..Config::default()
        };
        assert!(cfg.io_worker_threads() >= 2, "derived worker count is at least 2");
        assert_eq!(cfg.concurrency_limit(), None);
        assert_eq!(cfg.progress_throttle(), None);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }

    #[test]
    fn test_explicit_values() {
        let cfg = Config {
            io_threads: 3,
            io_max_concurrent: 8,
            ..Config::default()
        };
        assert_eq!(cfg.io_worker_threads(), 3);
        assert_eq!(cfg.concurrency_limit(), Some(8));
        assert_eq!(cfg.progress_throttle(), Some(Duration::from_secs(1)));
    }
}
