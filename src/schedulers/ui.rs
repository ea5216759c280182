//! # Serialized event loop (`ui`).
//!
//! [`UiScheduler`] owns exactly one OS thread running a current-thread tokio runtime
//! that drains a FIFO queue:
//!
//! ```text
//! submit(job) ──► [unbounded queue] ──► ui thread:
//!                                        while let Some(job) = rx.recv().await {
//!                                            job.await;      // one job at a time
//!                                        }
//! ```
//!
//! ## Rules
//! - Jobs never overlap: the next job starts only after the previous one finished.
//! - Jobs are always queued, even when submitted from the ui thread itself.
//! - A job that blocks stalls the whole loop. Keep ui bodies short and move blocking
//!   work to the io scheduler.

use std::thread::{JoinHandle, ThreadId};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::scheduler::{Job, Scheduler, current_id, mark_current, next_scheduler_id};
use crate::config::Config;
use crate::error::SchedulerError;

/// Single-threaded, strictly serialized scheduler.
pub struct UiScheduler {
    id: u64,
    name: String,
    tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
}

impl UiScheduler {
    /// Spawns the event-loop thread.
    pub fn new(cfg: &Config) -> Result<Self, SchedulerError> {
        let id = next_scheduler_id();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SchedulerError::Runtime {
                error: e.to_string(),
            })?;
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        let thread = std::thread::Builder::new()
            .name(format!("{}-ui", cfg.thread_name))
            .spawn(move || {
                mark_current(id);
                runtime.block_on(async move {
                    while let Some(job) = rx.recv().await {
                        job.await;
                    }
                });
            })
            .map_err(|e| SchedulerError::Runtime {
                error: e.to_string(),
            })?;

        Ok(Self {
            id,
            name: "ui".to_string(),
            thread_id: thread.thread().id(),
            tx: Mutex::new(Some(tx)),
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Id of the event-loop thread.
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Closes the queue; already queued jobs still run.
    ///
    /// Joins the loop thread unless called from it.
    pub fn shutdown(&self) {
        drop(self.tx.lock().take());
        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            if std::thread::current().id() != self.thread_id {
                let _ = handle.join();
            }
        }
    }
}

impl Scheduler for UiScheduler {
    fn name(&self) -> &str {
        &self.name
    }

    fn submit(&self, job: Job) -> Result<(), SchedulerError> {
        let closed = || SchedulerError::Closed {
            scheduler: self.name.clone(),
        };
        match self.tx.lock().as_ref() {
            Some(tx) => tx.send(job).map_err(|_| closed()),
            None => Err(closed()),
        }
    }

    fn is_current(&self) -> bool {
        current_id() == self.id
    }
}

impl Drop for UiScheduler {
    fn drop(&mut self) {
        drop(self.tx.lock().take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn cfg() -> Config {
        Config {
            thread_name: "uitest".into(),
            ..Config::default()
        }
    }

    #[test]
    fn test_jobs_run_on_the_loop_thread() {
        let ui = UiScheduler::new(&cfg()).expect("ui");
        let (tx, rx) = std::sync::mpsc::channel();
        let expected = ui.thread_id();
        ui.submit(Box::pin(async move {
            let _ = tx.send(std::thread::current().id());
        }))
        .expect("submit");
        let got = rx.recv_timeout(Duration::from_secs(5)).expect("job ran");
        assert_eq!(got, expected);
    }

    #[test]
    fn test_jobs_never_overlap() {
        let ui = UiScheduler::new(&cfg()).expect("ui");
        let busy = Arc::new(AtomicBool::new(false));
        let overlapped = Arc::new(AtomicBool::new(false));
        let (tx, rx) = std::sync::mpsc::channel();

        for _ in 0..5 {
            let busy = Arc::clone(&busy);
            let overlapped = Arc::clone(&overlapped);
            let tx = tx.clone();
            ui.submit(Box::pin(async move {
                if busy.swap(true, Ordering::SeqCst) {
                    overlapped.store(true, Ordering::SeqCst);
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
                busy.store(false, Ordering::SeqCst);
                let _ = tx.send(());
            }))
            .expect("submit");
        }
        for _ in 0..5 {
            rx.recv_timeout(Duration::from_secs(5)).expect("job ran");
        }
        assert!(!overlapped.load(Ordering::SeqCst), "ui jobs must be serialized");
    }

    #[test]
    fn test_shutdown_rejects_new_jobs() {
        let ui = UiScheduler::new(&cfg()).expect("ui");
        ui.shutdown();
        assert!(ui.submit(Box::pin(async {})).is_err());
    }
}
