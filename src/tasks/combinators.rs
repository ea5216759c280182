//! # Combinators.
//!
//! Each combinator returns a new task that lists the receiver as its dependent, so
//! it only runs once the receiver is terminal. Nothing here schedules work; the
//! executor does that when the returned task (or anything above it) is started.
//!
//! | Combinator      | Relying | Runs when receiver ...     | Produces                   |
//! |-----------------|---------|----------------------------|----------------------------|
//! | `then_apply`    | yes     | succeeded                  | `f(value)`                 |
//! | `then_accept`   | yes     | succeeded                  | `()` after `f(value)`      |
//! | `then_run`      | yes     | succeeded                  | `()` after `f()`           |
//! | `then_compose`  | yes     | succeeded                  | outcome of task `f(value)` |
//! | `with_compose`  | no      | terminated                 | outcome of task `f(v, e)`  |
//! | `when_complete` | no      | terminated                 | receiver's outcome         |
//!
//! A failed or cancelled receiver short-circuits the relying combinators: their
//! closure is dropped without being called. Every combinator has an `_on` variant
//! pinning the closure to a scheduler; unnamed combinator tasks are named after the
//! calling location.

use std::panic::Location;

use super::builder::TaskBuilder;
use super::handle::Task;
use super::state::Significance;
use crate::error::TaskError;
use crate::schedulers::SchedulerRef;

#[track_caller]
fn caller_name(op: &str) -> String {
    let loc = Location::caller();
    format!("{op}@{}:{}", loc.file(), loc.line())
}

impl<T: Clone + Send + Sync + 'static> Task<T> {
    #[track_caller]
    fn successor(&self, op: &str, scheduler: Option<SchedulerRef>) -> TaskBuilder {
        let builder = TaskBuilder::new(caller_name(op)).with_dependent(self);
        match scheduler {
            Some(s) => builder.with_scheduler(s),
            None => builder,
        }
    }

    fn value_or_err(&self) -> Result<T, TaskError> {
        self.result().ok_or_else(|| {
            self.error().unwrap_or_else(|| {
                TaskError::fail(format!("task `{}` produced no value", self.name()))
            })
        })
    }

    /// Runs `f(value)` after the receiver succeeds.
    #[track_caller]
    pub fn then_apply<U, F>(&self, f: F) -> Task<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(T) -> Result<U, TaskError> + Send + 'static,
    {
        let builder = self.successor("then_apply", None);
        self.apply_with(builder, f)
    }

    /// [`then_apply`](Self::then_apply) on `scheduler`.
    #[track_caller]
    pub fn then_apply_on<U, F>(&self, scheduler: SchedulerRef, f: F) -> Task<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(T) -> Result<U, TaskError> + Send + 'static,
    {
        let builder = self.successor("then_apply", Some(scheduler));
        self.apply_with(builder, f)
    }

    fn apply_with<U, F>(&self, builder: TaskBuilder, f: F) -> Task<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(T) -> Result<U, TaskError> + Send + 'static,
    {
        let prev = self.clone();
        builder.build(move |_ctx| async move { f(prev.value_or_err()?) })
    }

    /// Consumes the value after the receiver succeeds.
    #[track_caller]
    pub fn then_accept<F>(&self, f: F) -> Task<()>
    where
        F: FnOnce(T) -> Result<(), TaskError> + Send + 'static,
    {
        let builder = self.successor("then_accept", None);
        self.apply_with(builder, f)
    }

    #[track_caller]
    pub fn then_accept_on<F>(&self, scheduler: SchedulerRef, f: F) -> Task<()>
    where
        F: FnOnce(T) -> Result<(), TaskError> + Send + 'static,
    {
        let builder = self.successor("then_accept", Some(scheduler));
        self.apply_with(builder, f)
    }

    /// Runs `f()` after the receiver succeeds, ignoring its value.
    #[track_caller]
    pub fn then_run<F>(&self, f: F) -> Task<()>
    where
        F: FnOnce() -> Result<(), TaskError> + Send + 'static,
    {
        let builder = self.successor("then_run", None);
        self.apply_with(builder, move |_| f())
    }

    #[track_caller]
    pub fn then_run_on<F>(&self, scheduler: SchedulerRef, f: F) -> Task<()>
    where
        F: FnOnce() -> Result<(), TaskError> + Send + 'static,
    {
        let builder = self.successor("then_run", Some(scheduler));
        self.apply_with(builder, move |_| f())
    }

    /// Flattens `f(value)`: the returned task completes with the outcome of the task
    /// `f` produces. The inner task is resolved when `f` returns, not before.
    #[track_caller]
    pub fn then_compose<U, F>(&self, f: F) -> Task<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(T) -> Task<U> + Send + 'static,
    {
        let builder = self.successor("then_compose", None);
        self.compose_with(builder, f)
    }

    #[track_caller]
    pub fn then_compose_on<U, F>(&self, scheduler: SchedulerRef, f: F) -> Task<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(T) -> Task<U> + Send + 'static,
    {
        let builder = self.successor("then_compose", Some(scheduler));
        self.compose_with(builder, f)
    }

    fn compose_with<U, F>(&self, builder: TaskBuilder, f: F) -> Task<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(T) -> Task<U> + Send + 'static,
    {
        let prev = self.clone();
        builder.build_compose(move |_ctx| async move { Ok(f(prev.value_or_err()?)) })
    }

    /// Lenient compose: `f(value, error)` runs whatever the receiver's outcome.
    #[track_caller]
    pub fn with_compose<U, F>(&self, f: F) -> Task<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(Option<T>, Option<TaskError>) -> Task<U> + Send + 'static,
    {
        let prev = self.clone();
        self.successor("with_compose", None)
            .with_relying(false)
            .build_compose(move |_ctx| async move { Ok(f(prev.result(), prev.error())) })
    }

    /// Calls `handler(value, error)` once the receiver is terminal, whatever the outcome.
    ///
    /// The returned task carries the receiver's outcome. An error returned by the
    /// handler replaces it.
    #[track_caller]
    pub fn when_complete<F>(&self, handler: F) -> Task<T>
    where
        F: FnOnce(Option<T>, Option<TaskError>) -> Result<(), TaskError> + Send + 'static,
    {
        let builder = self.successor("when_complete", None);
        self.observe_with(builder, handler)
    }

    /// [`when_complete`](Self::when_complete) on `scheduler`; typically the UI scheduler.
    #[track_caller]
    pub fn when_complete_on<F>(&self, scheduler: SchedulerRef, handler: F) -> Task<T>
    where
        F: FnOnce(Option<T>, Option<TaskError>) -> Result<(), TaskError> + Send + 'static,
    {
        let builder = self.successor("when_complete", Some(scheduler));
        self.observe_with(builder, handler)
    }

    fn observe_with<F>(&self, builder: TaskBuilder, handler: F) -> Task<T>
    where
        F: FnOnce(Option<T>, Option<TaskError>) -> Result<(), TaskError> + Send + 'static,
    {
        let prev = self.clone();
        builder
            .with_relying(false)
            .with_significance(Significance::Moderate)
            .build(move |_ctx| async move {
                let value = prev.result();
                let error = prev.error();
                handler(value.clone(), error.clone())?;
                match (value, error) {
                    (Some(v), _) => Ok(v),
                    (None, Some(e)) => Err(e),
                    (None, None) => prev.value_or_err(),
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combinator_named_after_caller() {
        let t = Task::supply("leaf", || Ok(1u32));
        let next = t.then_apply(|v| Ok(v + 1));
        let name = next.name();
        assert!(name.starts_with("then_apply@"), "{name}");
        assert!(name.contains("combinators.rs"), "{name}");
    }

    #[test]
    fn test_relying_flags() {
        let t = Task::supply("leaf", || Ok(1u32));
        assert!(t.then_apply(|v| Ok(v)).is_relying_on_dependents());
        assert!(t.then_compose(Task::completed).is_relying_on_dependents());
        assert!(!t.with_compose(|v, _| Task::completed(v)).is_relying_on_dependents());

        let observer = t.when_complete(|_, _| Ok(()));
        assert!(!observer.is_relying_on_dependents());
        assert_eq!(observer.significance(), Significance::Moderate);
        assert_eq!(observer.dependents(), vec![t.erase()]);
    }

    #[test]
    fn test_with_name_overrides_location() {
        let t = Task::supply("leaf", || Ok(()));
        let named = t.then_run(|| Ok(())).with_name("cleanup");
        assert_eq!(named.name(), "cleanup");
    }
}
