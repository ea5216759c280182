//! # Contexts handed to task code.
//!
//! - [`PrepareContext`]: given to the prepare hook during graph resolution, on the
//!   resolving thread, before the task's dependents are enumerated.
//! - [`TaskContext`]: given to the body when it runs on its scheduler.
//! - [`PostExecuteContext`]: given to the post hook once the task's dependencies
//!   (follow-up tasks) are terminal, on the task's scheduler.
//!
//! Both publish property changes to the executor's bus. The `"total"` property of a
//! task that owns a stage announces the stage total to the progress tracker.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::handle::TaskRef;
use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::progress::ProgressTracker;

/// Property key announcing how many counter ticks the owner's stage expects.
pub const TOTAL_PROPERTY: &str = "total";

/// Executor services reachable from task code.
pub(crate) struct ExecEnv {
    pub(crate) executor: u64,
    pub(crate) bus: Bus,
    pub(crate) progress: Arc<ProgressTracker>,
    pub(crate) throttle: Option<Duration>,
}

impl ExecEnv {
    pub(crate) fn publish(&self, ev: Event) {
        self.bus.publish(ev.with_executor(self.executor));
    }

    pub(crate) fn set_property(&self, task: &TaskRef, key: String, value: Value) {
        if key == TOTAL_PROPERTY {
            if let (Some(stage), Some(total)) = (task.node().own_stage(), value.as_u64()) {
                self.progress.set_total(&stage, total);
            }
        }
        task.node().set_property(key.clone(), value);
        self.publish(
            Event::new(EventKind::PropertiesUpdated)
                .with_node(task)
                .with_reason(key),
        );
    }
}

/// Context of a prepare hook.
pub struct PrepareContext<'a> {
    task: &'a TaskRef,
    env: &'a ExecEnv,
}

impl<'a> PrepareContext<'a> {
    pub(crate) fn new(task: &'a TaskRef, env: &'a ExecEnv) -> Self {
        Self { task, env }
    }

    /// The task being prepared.
    pub fn task(&self) -> &TaskRef {
        self.task
    }

    /// Sets a progress property.
    pub fn set_property(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.env.set_property(self.task, key.into(), value.into());
    }

    /// Shorthand for `set_property("total", total)`.
    pub fn set_total(&self, total: u64) {
        self.set_property(TOTAL_PROPERTY, total);
    }
}

/// Context of a running task body.
///
/// Cancellation is advisory: the body should poll [`is_cancelled`](Self::is_cancelled)
/// or race [`cancelled`](Self::cancelled) at safe points (between chunks of a download).
pub struct TaskContext {
    task: TaskRef,
    env: Arc<ExecEnv>,
}

impl TaskContext {
    pub(crate) fn new(task: TaskRef, env: Arc<ExecEnv>) -> Self {
        Self { task, env }
    }

    /// The running task.
    pub fn task(&self) -> &TaskRef {
        &self.task
    }

    /// Cancellation token of this task.
    pub fn token(&self) -> CancellationToken {
        self.task.node().token().clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.task.node().cancel_requested()
    }

    /// Resolves once cancellation is requested.
    pub async fn cancelled(&self) {
        self.task.node().token().cancelled().await;
    }

    /// `Err(TaskError::Cancelled)` once cancellation is requested.
    pub fn check_cancelled(&self) -> Result<(), TaskError> {
        if self.is_cancelled() {
            Err(TaskError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Upstream tasks; all terminal by the time the body runs.
    pub fn dependents(&self) -> Vec<TaskRef> {
        self.task.dependents()
    }

    /// Dependents that failed or were cancelled.
    pub fn failed_dependents(&self) -> Vec<TaskRef> {
        self.dependents()
            .into_iter()
            .filter(|d| d.error().is_some())
            .collect()
    }

    /// Whether every dependent succeeded.
    pub fn dependents_succeeded(&self) -> bool {
        self.dependents().iter().all(|d| d.error().is_none())
    }

    /// Aggregates failed and cancelled dependents into one error ("N of M failed").
    pub fn check_dependents(&self) -> Result<(), TaskError> {
        let deps = self.dependents();
        let errors: Vec<(String, TaskError)> = deps
            .iter()
            .filter_map(|d| d.error().map(|e| (d.name(), e)))
            .collect();
        if errors.is_empty() {
            return Ok(());
        }
        Err(TaskError::Aggregate {
            failed: errors.len(),
            total: deps.len(),
            errors,
        })
    }

    /// Schedules `task` to run after this body succeeds, before this task is done.
    ///
    /// Ignored if the body fails or is cancelled.
    pub fn add_dependency(&self, task: impl Into<TaskRef>) {
        self.task.node().add_dependency(task.into());
    }

    /// Sets a progress property.
    pub fn set_property(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.env.set_property(&self.task, key.into(), value.into());
    }

    /// Reports `done` of `total` units of work.
    pub fn update_progress(&self, done: u64, total: u64) {
        let fraction = if total == 0 {
            0.0
        } else {
            done as f64 / total as f64
        };
        self.update_progress_fraction(fraction);
    }

    /// Reports fractional progress in `[0, 1]` (clamped), throttled per task.
    pub fn update_progress_fraction(&self, fraction: f64) {
        let value = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        if self.task.node().record_progress(value, self.env.throttle) {
            self.env.publish(
                Event::new(EventKind::ProgressUpdated)
                    .with_node(&self.task)
                    .with_progress(value),
            );
        }
    }

    /// Reports a status message.
    pub fn update_message(&self, message: impl Into<String>) {
        let message = message.into();
        self.task.node().set_message(message.clone());
        self.env.publish(
            Event::new(EventKind::MessageUpdated)
                .with_node(&self.task)
                .with_reason(message),
        );
    }
}

/// Context of a post hook.
pub struct PostExecuteContext<'a> {
    task: &'a TaskRef,
    env: &'a ExecEnv,
}

impl<'a> PostExecuteContext<'a> {
    pub(crate) fn new(task: &'a TaskRef, env: &'a ExecEnv) -> Self {
        Self { task, env }
    }

    pub fn task(&self) -> &TaskRef {
        self.task
    }

    /// Follow-up tasks; all terminal by the time the hook runs.
    pub fn dependencies(&self) -> Vec<TaskRef> {
        self.task.dependencies()
    }

    /// Whether every dependency succeeded, whatever the task relies on.
    pub fn dependencies_succeeded(&self) -> bool {
        self.dependencies().iter().all(|d| d.error().is_none())
    }

    pub fn set_property(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.env.set_property(self.task, key.into(), value.into());
    }
}
