//! # Function-backed tasks.
//!
//! Shorthand constructors that wrap a closure into a leaf [`Task`], plus the
//! externally-completed stub ([`Task::manual`]) and the fan-in helpers
//! [`Task::all_of`] and [`Task::collect`].
//!
//! ## Example
//! ```rust
//! use taskgraph::{Task, TaskError};
//!
//! let t = Task::supply("parse", || "42".parse::<u32>().map_err(TaskError::fail));
//! assert_eq!(t.name(), "parse");
//!
//! let stub = Task::<u32>::manual("stub");
//! assert!(stub.complete(7));
//! assert_eq!(stub.result(), Some(7));
//! ```

use std::future::Future;

use super::builder::TaskBuilder;
use super::context::TaskContext;
use super::handle::{Task, TaskRef};
use super::state::Significance;
use crate::error::TaskError;
use crate::schedulers::SchedulerRef;

impl<T: Send + Sync + 'static> Task<T> {
    /// Leaf task computing `f()` on the executor's default scheduler.
    pub fn supply<F>(name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce() -> Result<T, TaskError> + Send + 'static,
    {
        TaskBuilder::new(name).build(move |_ctx| async move { f() })
    }

    /// Leaf task computing `f()` on `scheduler`.
    pub fn supply_on<F>(name: impl Into<String>, scheduler: SchedulerRef, f: F) -> Self
    where
        F: FnOnce() -> Result<T, TaskError> + Send + 'static,
    {
        TaskBuilder::new(name)
            .with_scheduler(scheduler)
            .build(move |_ctx| async move { f() })
    }

    /// Leaf task running an async body with access to its [`TaskContext`].
    pub fn supply_async<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        TaskBuilder::new(name).build(f)
    }

    /// Task without a body, resolved from outside via [`complete`](Task::complete)
    /// or [`fail`](Task::fail). An executor waits for it but never runs anything.
    pub fn manual(name: impl Into<String>) -> Self {
        TaskBuilder::new(name).build_raw(None, true)
    }

    /// Already SUCCEEDED task holding `value`.
    pub fn completed(value: T) -> Self {
        let task = Self::manual("completed");
        task.complete(value);
        task
    }

    /// Already FAILED task holding `error`.
    pub fn failed(error: TaskError) -> Self {
        let task = Self::manual("failed");
        task.fail(error);
        task
    }
}

impl Task<()> {
    /// Leaf task running a side effect.
    pub fn run_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce() -> Result<(), TaskError> + Send + 'static,
    {
        Task::supply(name, f)
    }

    /// Strict barrier over `tasks`: succeeds once all of them succeeded, fails (or is
    /// cancelled) as soon as the first of them does not.
    pub fn all_of<I>(tasks: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<TaskRef>,
    {
        TaskBuilder::new("all_of")
            .with_significance(Significance::Moderate)
            .with_dependents(tasks)
            .build(|_ctx| async { Ok(()) })
    }
}

impl<U: Clone + Send + Sync + 'static> Task<Vec<U>> {
    /// Lenient fan-in: waits for every task and yields the results of those that
    /// succeeded, in input order. Failed and cancelled inputs are skipped.
    pub fn collect(name: impl Into<String>, tasks: Vec<Task<U>>) -> Self {
        let inputs = tasks.clone();
        TaskBuilder::new(name)
            .with_relying(false)
            .with_dependents(tasks)
            .build(move |_ctx| async move {
                Ok(inputs.iter().filter_map(Task::result).collect())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskState;

    #[test]
    fn test_completed_and_failed_are_terminal() {
        let ok = Task::completed(5u32);
        assert_eq!(ok.state(), TaskState::Succeeded);
        assert_eq!(ok.result(), Some(5));

        let bad = Task::<u32>::failed(TaskError::fail("nope"));
        assert_eq!(bad.state(), TaskState::Failed);
        assert_eq!(bad.result(), None);
        assert_eq!(bad.error().map(|e| e.as_label()), Some("task_failed"));
    }

    #[test]
    fn test_manual_completes_once() {
        let stub = Task::<String>::manual("stub");
        assert!(stub.complete("first".into()));
        assert!(!stub.complete("second".into()), "second completion is ignored");
        assert!(!stub.fail(TaskError::Cancelled));
        assert_eq!(stub.result().as_deref(), Some("first"));
    }

    #[test]
    fn test_all_of_is_moderate_and_strict() {
        let a = Task::supply("a", || Ok(1));
        let b = Task::supply("b", || Ok(2));
        let all = Task::all_of([a.erase(), b.erase()]);
        assert_eq!(all.significance(), Significance::Moderate);
        assert!(all.is_relying_on_dependents());
        assert_eq!(all.dependents().len(), 2);
    }

    #[test]
    fn test_collect_is_lenient() {
        let a = Task::supply("a", || Ok(1));
        let all = Task::collect("collect", vec![a]);
        assert!(!all.is_relying_on_dependents());
    }
}
