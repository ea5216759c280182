//! # Background worker pool (`io`).
//!
//! [`IoScheduler`] owns a multi-thread tokio runtime sized for blocking I/O.
//!
//! ```text
//! submit(job) ──► handle.spawn(async {
//!                    acquire permit (optional, cfg.io_max_concurrent)
//!                    job.await
//!                 })
//! ```
//!
//! ## Rules
//! - Worker count is oversubscribed by default (`2 × CPUs`): bodies on this scheduler
//!   may block on network or file I/O.
//! - With an admission limit, excess jobs wait for a permit. Admission blocks; it never fails.
//! - After [`IoScheduler::shutdown`] every `submit` fails with [`SchedulerError::Closed`].
//! - Shutdown drops queued and running jobs (including one spawned while shutdown was
//!   in progress); the executor's job wrapper settles their tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::Semaphore;

use super::scheduler::{Job, Scheduler, current_id, mark_current, next_scheduler_id};
use crate::config::Config;
use crate::error::SchedulerError;

/// Multi-threaded scheduler for blocking and long-running work.
pub struct IoScheduler {
    id: u64,
    name: String,
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    permits: Option<Arc<Semaphore>>,
    closed: AtomicBool,
}

impl IoScheduler {
    /// Builds the runtime described by `cfg`.
    pub fn new(cfg: &Config) -> Result<Self, SchedulerError> {
        let id = next_scheduler_id();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(cfg.io_worker_threads())
            .thread_name(format!("{}-io", cfg.thread_name))
            .on_thread_start(move || mark_current(id))
            .enable_all()
            .build()
            .map_err(|e| SchedulerError::Runtime {
                error: e.to_string(),
            })?;

        Ok(Self {
            id,
            name: "io".to_string(),
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            permits: cfg.concurrency_limit().map(|n| Arc::new(Semaphore::new(n))),
            closed: AtomicBool::new(false),
        })
    }

    /// Handle of the backing runtime, used to spawn executor-internal workers.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Stops accepting jobs and shuts the runtime down without waiting for running jobs.
    ///
    /// Safe to call from any thread, including this scheduler's own workers.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        if let Some(rt) = self.runtime.lock().take() {
            rt.shutdown_background();
        }
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Scheduler for IoScheduler {
    fn name(&self) -> &str {
        &self.name
    }

    fn submit(&self, job: Job) -> Result<(), SchedulerError> {
        if self.is_closed() {
            return Err(SchedulerError::Closed {
                scheduler: self.name.clone(),
            });
        }
        let permits = self.permits.clone();
        self.handle.spawn(async move {
            let _permit = match permits {
                Some(sem) => sem.acquire_owned().await.ok(),
                None => None,
            };
            job.await;
        });
        Ok(())
    }

    fn is_current(&self) -> bool {
        current_id() == self.id
    }
}

impl Drop for IoScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn small() -> Config {
        Config {
            io_threads: 2,
            thread_name: "iotest".into(),
            ..Config::default()
        }
    }

    #[test]
    fn test_jobs_run_on_named_pool_threads() {
        let io = IoScheduler::new(&small()).expect("runtime");
        let (tx, rx) = std::sync::mpsc::channel();
        io.submit(Box::pin(async move {
            let name = std::thread::current().name().map(str::to_owned);
            let _ = tx.send(name);
        }))
        .expect("submit");

        let name = rx.recv_timeout(Duration::from_secs(5)).expect("job ran");
        assert_eq!(name.as_deref(), Some("iotest-io"));
        assert!(!io.is_current(), "test thread is not an io worker");
    }

    #[test]
    fn test_admission_limit_serializes_jobs() {
        let cfg = Config {
            io_max_concurrent: 1,
            ..small()
        };
        let io = IoScheduler::new(&cfg).expect("runtime");
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = std::sync::mpsc::channel();

        for _ in 0..4 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let tx = tx.clone();
            io.submit(Box::pin(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                let _ = tx.send(());
            }))
            .expect("submit");
        }
        for _ in 0..4 {
            rx.recv_timeout(Duration::from_secs(5)).expect("job finished");
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1, "limit of 1 admits one job at a time");
    }

    #[test]
    fn test_submit_after_shutdown_is_rejected() {
        let io = IoScheduler::new(&small()).expect("runtime");
        io.shutdown();
        let err = io.submit(Box::pin(async {})).unwrap_err();
        assert_eq!(err.as_label(), "scheduler_closed");
    }
}
