//! # Run the body of a single task.
//!
//! Executes a task body exactly once on the scheduler it was submitted to and turns
//! whatever happens into the node's single terminal transition.
//!
//! ## Flow
//! ```text
//! run_node(task):
//!   ├─ cancellation requested?   → Cancelled (body never runs)
//!   ├─ Pending → Running          (lost race with an external complete → return)
//!   ├─ publish TaskRunning
//!   ├─ body(ctx) under catch_unwind
//!   │    Ok(Value(v))            → Succeeded(v)
//!   │    Ok(Value(v)), follow-ups → engine.follow_up(task, v)
//!   │    Ok(Then(inner))         → engine.continue_with(task, inner)
//!   │    Err(Cancelled)          → Cancelled
//!   │    Err(e), token cancelled → Cancelled
//!   │    Err(e)                  → Failed(e)
//!   │    panic                   → Failed(Panicked)
//!   └─ complete(outcome)          (terminal events are published by the engine's watcher)
//! ```
//!
//! ## Rules
//! - A body is taken out of its node before it runs, so it can never run twice
//! - Panics never escape into the scheduler thread
//! - Cancellation is cooperative: a running body is never aborted
//! - A job its scheduler drops unfinished (runtime shut down, or refused by `submit`)
//!   still settles the node: Cancelled if cancellation was requested, otherwise
//!   Failed(Rejected)

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::debug;

use crate::core::engine::Engine;
use crate::error::TaskError;
use crate::events::{Event, EventKind};
use crate::schedulers::Job;
use crate::tasks::node::{Completion, Outcome};
use crate::tasks::{TaskContext, TaskRef};

/// Wraps `work` for `task` so that dropping the job before it finishes settles the node.
pub(crate) fn guarded<F>(task: TaskRef, scheduler: &str, work: F) -> Job
where
    F: Future<Output = ()> + Send + 'static,
{
    let guard = DropGuard {
        task: Some(task),
        scheduler: scheduler.to_owned(),
    };
    async move {
        work.await;
        guard.disarm();
    }
    .boxed()
}

struct DropGuard {
    task: Option<TaskRef>,
    scheduler: String,
}

impl DropGuard {
    fn disarm(mut self) {
        self.task = None;
    }
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        let node = task.node();
        let outcome = if node.cancel_requested() {
            Outcome::Cancelled
        } else {
            Outcome::Failed(TaskError::Rejected {
                scheduler: self.scheduler.clone(),
                reason: "job dropped by the scheduler before completion".to_string(),
            })
        };
        if node.complete(outcome) {
            debug!(
                task = %task.name(),
                scheduler = %self.scheduler,
                "job dropped by scheduler"
            );
        }
    }
}

/// Executes the body of `task`, completing the node with the result.
pub(crate) async fn run_node(engine: Arc<Engine>, task: TaskRef) {
    let node = task.node();
    if engine.is_cancelled() || node.cancel_requested() {
        node.complete(Outcome::Cancelled);
        return;
    }
    if !node.try_start() {
        return;
    }
    let Some(body) = node.take_body() else {
        node.complete(Outcome::Failed(TaskError::fail(format!(
            "task `{}` has no body",
            task.name()
        ))));
        return;
    };

    engine.env().publish(Event::new(EventKind::TaskRunning).with_node(&task));
    let ctx = TaskContext::new(task.clone(), Arc::clone(engine.env()));
    let res = AssertUnwindSafe(async move { body(ctx).await })
        .catch_unwind()
        .await;

    let outcome = match res {
        Ok(Ok(Completion::Value(value))) if node.has_follow_up() => {
            engine.follow_up(&task, value);
            return;
        }
        Ok(Ok(Completion::Value(value))) => Outcome::Succeeded(value),
        Ok(Ok(Completion::Then(inner))) => {
            engine.continue_with(&task, inner);
            return;
        }
        Ok(Err(e)) if e.is_cancelled() || node.cancel_requested() => Outcome::Cancelled,
        Ok(Err(e)) => Outcome::Failed(e),
        Err(panic) => Outcome::Failed(TaskError::Panicked {
            info: panic_message(panic.as_ref()),
        }),
    };
    node.complete(outcome);
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_variants() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(s.as_ref()), "static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "owned");
        let other: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }

    fn pending(name: &str) -> TaskRef {
        crate::Task::<()>::manual(name).erase()
    }

    #[test]
    fn test_dropped_job_is_rejected() {
        let task = pending("dropped");
        task.node().try_start();
        drop(guarded(task.clone(), "io", std::future::pending()));
        match task.error() {
            Some(TaskError::Rejected { scheduler, .. }) => assert_eq!(scheduler, "io"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_dropped_job_after_cancel_is_cancelled() {
        let task = pending("cancelled");
        task.node().try_start();
        task.node().token().cancel();
        drop(guarded(task.clone(), "io", std::future::pending()));
        assert_eq!(task.state(), crate::TaskState::Cancelled);
    }

    #[tokio::test]
    async fn test_finished_job_leaves_node_alone() {
        let task = pending("finished");
        guarded(task.clone(), "io", async {}).await;
        assert_eq!(task.state(), crate::TaskState::Pending);
    }
}
