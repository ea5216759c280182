//! # Core scheduler trait
//!
//! A [`Scheduler`] is a named execution context. It accepts a job (a boxed future)
//! and guarantees the job is polled on threads that belong to that context.
//!
//! ## Contract
//! - `submit` never blocks the caller and never runs the job inline on the calling thread.
//! - A job that cannot be accepted (scheduler closed) is reported as an error so the
//!   owning task can fail instead of hanging.
//! - Panics inside a job are the caller's concern: the executor wraps every task body
//!   in `catch_unwind` before submitting it.
//!
//! ## Thread identity
//! Scheduler-owned threads record the scheduler id in a thread-local at start-up,
//! which backs [`Scheduler::is_current`].

use std::cell::Cell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::BoxFuture;

use crate::error::SchedulerError;

/// Unit of work accepted by a scheduler.
pub type Job = BoxFuture<'static, ()>;

/// Shared handle to a scheduler.
pub type SchedulerRef = Arc<dyn Scheduler>;

static NEXT_SCHEDULER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_SCHEDULER: Cell<u64> = const { Cell::new(0) };
}

/// Allocates a process-unique scheduler id (never 0).
pub(crate) fn next_scheduler_id() -> u64 {
    NEXT_SCHEDULER_ID.fetch_add(1, Ordering::Relaxed)
}

/// Marks the calling thread as owned by scheduler `id`.
pub(crate) fn mark_current(id: u64) {
    CURRENT_SCHEDULER.with(|c| c.set(id));
}

/// Id of the scheduler owning the calling thread (0 if none).
pub(crate) fn current_id() -> u64 {
    CURRENT_SCHEDULER.with(Cell::get)
}

/// Execution context with thread affinity.
pub trait Scheduler: Send + Sync + 'static {
    /// Human-readable name (for logs and errors).
    fn name(&self) -> &str;

    /// Queues `job` for execution on this scheduler's threads.
    fn submit(&self, job: Job) -> Result<(), SchedulerError>;

    /// Returns `true` if the calling thread belongs to this scheduler.
    fn is_current(&self) -> bool {
        false
    }
}

impl std::fmt::Debug for dyn Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler").field("name", &self.name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_nonzero() {
        let a = next_scheduler_id();
        let b = next_scheduler_id();
        assert_ne!(a, 0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_mark_current_is_thread_local() {
        let id = next_scheduler_id();
        mark_current(id);
        assert_eq!(current_id(), id);
        let other = std::thread::spawn(current_id).join().expect("thread");
        assert_eq!(other, 0, "fresh threads belong to no scheduler");
    }
}
