//! # Task builder.
//!
//! [`TaskBuilder`] is the explicit constructor behind every task: leaf helpers and
//! combinators are thin wrappers around it. It captures the small closed capability
//! set of a task:
//!
//! ```text
//! with_pre_execute(|ctx| children)   resolve dependents lazily, once
//! build(|ctx| async { body })        run, at most once
//! with_relying(bool)                 strict (skip body on failed dependent) or lenient
//! with_dependencies([..])            follow-up tasks run after a successful body
//! with_post_execute(|ctx| ..)        runs once the follow-ups are terminal
//! with_relying_on_dependencies(bool) a failed follow-up fails this task (default) or not
//! ```
//!
//! ## Example
//! ```rust
//! use taskgraph::{Task, TaskBuilder, TaskError};
//!
//! let leaf = Task::supply("answer", || Ok::<_, TaskError>(41));
//! let root: Task<i32> = TaskBuilder::new("plus-one")
//!     .with_dependent(&leaf)
//!     .build(move |_ctx| async move {
//!         Ok(leaf.result().unwrap_or_default() + 1)
//!     });
//! assert_eq!(root.dependents().len(), 1);
//! ```

use std::future::Future;
use std::sync::Arc;

use super::context::{PostExecuteContext, PrepareContext, TaskContext};
use super::handle::{Task, TaskRef};
use super::node::{AnyValue, Body, Completion, NodeSpec, PostFn, PrepareFn};
use super::state::Significance;
use crate::error::TaskError;
use crate::schedulers::SchedulerRef;

/// Fluent constructor for tasks.
pub struct TaskBuilder {
    name: String,
    significance: Significance,
    relying: bool,
    relying_on_dependencies: bool,
    dependents: Vec<TaskRef>,
    dependencies: Vec<TaskRef>,
    prepare: Option<PrepareFn>,
    post: Option<PostFn>,
    stage: Option<String>,
    counter: Option<String>,
    scheduler: Option<SchedulerRef>,
}

impl TaskBuilder {
    /// Creates a builder for a strict (`relying = true`), `Major` task.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            significance: Significance::default(),
            relying: true,
            relying_on_dependencies: true,
            dependents: Vec::new(),
            dependencies: Vec::new(),
            prepare: None,
            post: None,
            stage: None,
            counter: None,
            scheduler: None,
        }
    }

    /// Pins the body to `scheduler`. Without it the executor's default scheduler is used.
    pub fn with_scheduler(mut self, scheduler: SchedulerRef) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_significance(mut self, significance: Significance) -> Self {
        self.significance = significance;
        self
    }

    /// `true`: a failed or cancelled dependent skips the body and fails this task.
    /// `false`: the body always runs once dependents are terminal.
    pub fn with_relying(mut self, relying: bool) -> Self {
        self.relying = relying;
        self
    }

    /// Adds an upstream task that must terminate before the body runs.
    pub fn with_dependent(mut self, task: impl Into<TaskRef>) -> Self {
        self.dependents.push(task.into());
        self
    }

    /// Adds several upstream tasks, keeping their order.
    pub fn with_dependents<I>(mut self, tasks: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<TaskRef>,
    {
        self.dependents.extend(tasks.into_iter().map(Into::into));
        self
    }

    /// Installs the prepare hook.
    ///
    /// It runs once, synchronously on the resolving thread, before dependents are
    /// enumerated; the tasks it returns are appended to the dependents. An error
    /// fails this task without running its body.
    pub fn with_pre_execute<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&PrepareContext<'_>) -> Result<Vec<TaskRef>, TaskError> + Send + 'static,
    {
        self.prepare = Some(Box::new(f));
        self
    }

    /// Adds a follow-up task, run after the body succeeds and before this task is done.
    pub fn with_dependency(mut self, task: impl Into<TaskRef>) -> Self {
        self.dependencies.push(task.into());
        self
    }

    pub fn with_dependencies<I>(mut self, tasks: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<TaskRef>,
    {
        self.dependencies.extend(tasks.into_iter().map(Into::into));
        self
    }

    /// `true`: a failed or cancelled dependency fails (or cancels) this task.
    /// `false`: this task keeps the body's value whatever its dependencies did.
    pub fn with_relying_on_dependencies(mut self, relying: bool) -> Self {
        self.relying_on_dependencies = relying;
        self
    }

    /// Installs the post hook.
    ///
    /// It runs on this task's scheduler after the body succeeded and every
    /// dependency is terminal, whether or not they succeeded. An error fails this task.
    pub fn with_post_execute<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&PostExecuteContext<'_>) -> Result<(), TaskError> + Send + 'static,
    {
        self.post = Some(Box::new(f));
        self
    }

    /// Stage this task reports to; children without a stage inherit it.
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Counter bumped when this task terminates, whatever the outcome.
    pub fn with_counter(mut self, key: impl Into<String>) -> Self {
        self.counter = Some(key.into());
        self
    }

    /// Builds a task whose body produces a value.
    pub fn build<T, F, Fut>(self, f: F) -> Task<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        let body: Body = Box::new(move |ctx| {
            Box::pin(async move {
                let value = f(ctx).await?;
                Ok(Completion::Value(Arc::new(value) as AnyValue))
            })
        });
        self.build_raw(Some(body), false)
    }

    /// Builds a task whose body produces another task; this task completes with
    /// that task's outcome. No thread waits in between.
    pub fn build_compose<U, F, Fut>(self, f: F) -> Task<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Task<U>, TaskError>> + Send + 'static,
    {
        let body: Body = Box::new(move |ctx| {
            Box::pin(async move {
                let next = f(ctx).await?;
                Ok(Completion::Then(next.erase()))
            })
        });
        self.build_raw(Some(body), false)
    }

    pub(crate) fn build_raw<T>(self, body: Option<Body>, manual: bool) -> Task<T> {
        Task::from_ref(TaskRef::from_spec(NodeSpec {
            name: self.name,
            significance: self.significance,
            relying: self.relying,
            relying_on_dependencies: self.relying_on_dependencies,
            manual,
            dependents: self.dependents,
            dependencies: self.dependencies,
            prepare: self.prepare,
            post: self.post,
            body,
            stage: self.stage,
            counter: self.counter,
            scheduler: self.scheduler,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskState;

    #[test]
    fn test_builder_defaults() {
        let t: Task<u8> = TaskBuilder::new("leaf").build(|_ctx| async { Ok(1) });
        assert_eq!(t.name(), "leaf");
        assert_eq!(t.state(), TaskState::Pending);
        assert_eq!(t.significance(), Significance::Major);
        assert!(t.is_relying_on_dependents());
        assert!(t.dependents().is_empty());
        assert!(t.scheduler_name().is_none());
    }

    #[test]
    fn test_builder_metadata() {
        let a: Task<()> = TaskBuilder::new("a").build(|_ctx| async { Ok(()) });
        let b: Task<()> = TaskBuilder::new("b")
            .with_relying(false)
            .with_significance(Significance::Minor)
            .with_stage("mods")
            .with_counter("mods.check")
            .with_dependent(&a)
            .build(|_ctx| async { Ok(()) });
        assert!(!b.is_relying_on_dependents());
        assert_eq!(b.significance(), Significance::Minor);
        assert_eq!(b.stage().as_deref(), Some("mods"));
        assert_eq!(b.counter_key().as_deref(), Some("mods.check"));
        assert_eq!(b.dependents(), vec![a.erase()]);
    }

    #[test]
    fn test_builder_follow_ups() {
        let cleanup: Task<()> = TaskBuilder::new("cleanup").build(|_ctx| async { Ok(()) });
        let t: Task<()> = TaskBuilder::new("install")
            .with_dependency(&cleanup)
            .with_relying_on_dependencies(false)
            .with_post_execute(|_| Ok(()))
            .build(|_ctx| async { Ok(()) });
        assert_eq!(t.dependencies(), vec![cleanup.erase()]);
        assert!(!t.is_relying_on_dependencies());
        assert!(t.dependents().is_empty());
        assert!(t.node().has_follow_up());

        let plain: Task<()> = TaskBuilder::new("plain").build(|_ctx| async { Ok(()) });
        assert!(plain.is_relying_on_dependencies());
        assert!(!plain.node().has_follow_up());
    }
}
