//! # Ambient-runtime scheduler (`direct`).
//!
//! [`DirectScheduler`] spawns jobs on whatever tokio runtime the submitting thread is
//! running in. Useful in tests and inside `#[tokio::test]` bodies where no dedicated
//! pool is wanted. A continuation submitted here runs next to the predecessor that
//! released it (io workers for io predecessors, the ui loop for ui predecessors).

use tokio::runtime::Handle;

use super::scheduler::{Job, Scheduler};
use crate::error::SchedulerError;

/// Scheduler that borrows the caller's runtime.
#[derive(Debug, Default)]
pub struct DirectScheduler;

impl DirectScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for DirectScheduler {
    fn name(&self) -> &str {
        "direct"
    }

    fn submit(&self, job: Job) -> Result<(), SchedulerError> {
        let handle = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;
        handle.spawn(job);
        Ok(())
    }

    fn is_current(&self) -> bool {
        Handle::try_current().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outside_runtime_is_rejected() {
        let err = DirectScheduler::new().submit(Box::pin(async {})).unwrap_err();
        assert_eq!(err.as_label(), "scheduler_no_runtime");
    }

    #[tokio::test]
    async fn test_inside_runtime_spawns() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        DirectScheduler::new()
            .submit(Box::pin(async move {
                let _ = tx.send(7);
            }))
            .expect("submit");
        assert_eq!(rx.await.expect("job ran"), 7);
    }
}
