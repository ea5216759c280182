//! # Task handles.
//!
//! - [`TaskRef`]: cloneable, type-erased handle. Used for dependents lists,
//!   executor roots and observation.
//! - [`Task<T>`]: typed handle over the same node; adds typed result access,
//!   combinators and run helpers. Derefs to [`TaskRef`].
//!
//! Handles compare and hash by node identity, which is what graph deduplication uses.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use serde_json::Value;

use super::node::{Node, NodeSpec, Outcome};
use super::state::{Significance, TaskState};
use crate::error::TaskError;

/// Type-erased handle to a task.
#[derive(Clone)]
pub struct TaskRef(pub(crate) Arc<Node>);

impl TaskRef {
    pub(crate) fn from_spec(spec: NodeSpec) -> Self {
        TaskRef(Node::new(spec))
    }

    pub(crate) fn node(&self) -> &Node {
        &self.0
    }

    /// Process-unique identity of the task.
    pub fn id(&self) -> u64 {
        self.0.id()
    }

    /// Display name.
    pub fn name(&self) -> String {
        self.0.name()
    }

    /// Renames the task (metadata only).
    pub fn set_name(&self, name: impl Into<String>) {
        self.0.set_name(name.into());
    }

    pub fn significance(&self) -> Significance {
        self.0.significance()
    }

    /// Changes the significance (metadata only).
    pub fn set_significance(&self, significance: Significance) {
        self.0.set_significance(significance);
    }

    /// Own stage, or the stage inherited from the parent that reached this task.
    pub fn stage(&self) -> Option<String> {
        self.0.stage()
    }

    /// Counter bumped when this task terminates.
    pub fn counter_key(&self) -> Option<String> {
        self.0.counter()
    }

    /// Name of the scheduler the body is pinned to, if any.
    pub fn scheduler_name(&self) -> Option<String> {
        self.0.scheduler().map(|s| s.name().to_owned())
    }

    /// Whether a failed or cancelled dependent skips this task's body.
    pub fn is_relying_on_dependents(&self) -> bool {
        self.0.is_relying()
    }

    /// Whether a failed or cancelled dependency fails (or cancels) this task.
    pub fn is_relying_on_dependencies(&self) -> bool {
        self.0.is_relying_on_dependencies()
    }

    pub fn state(&self) -> TaskState {
        self.0.state()
    }

    /// Whether the task reached a terminal state.
    pub fn is_done(&self) -> bool {
        self.0.state().is_terminal()
    }

    /// Error of a FAILED task; [`TaskError::Cancelled`] for a CANCELLED one.
    pub fn error(&self) -> Option<TaskError> {
        self.0.outcome().and_then(|o| o.error())
    }

    /// Result of a SUCCEEDED task, if it has type `U`.
    pub fn result_as<U: Clone + 'static>(&self) -> Option<U> {
        self.0.value().and_then(|v| v.downcast_ref::<U>().cloned())
    }

    /// Upstream tasks, including those added by the prepare hook.
    pub fn dependents(&self) -> Vec<TaskRef> {
        self.0.dependents()
    }

    /// Follow-up tasks run after the body succeeds.
    pub fn dependencies(&self) -> Vec<TaskRef> {
        self.0.dependencies()
    }

    pub fn properties(&self) -> HashMap<String, Value> {
        self.0.properties()
    }

    pub fn property(&self, key: &str) -> Option<Value> {
        self.0.property(key)
    }

    /// Last reported fractional progress.
    pub fn progress(&self) -> Option<f64> {
        self.0.progress()
    }

    /// Last reported status message.
    pub fn message(&self) -> Option<String> {
        self.0.message()
    }

    /// Requests cancellation of this task and every non-terminal task reachable from it.
    ///
    /// Pending tasks become CANCELLED immediately; running bodies observe the request
    /// through their context. Terminal tasks are left alone, so calling this twice is harmless.
    ///
    /// A root cancelled before any executor started it can still be started once:
    /// the executor finishes right away with [`ExecutorOutcome::Cancelled`](crate::ExecutorOutcome::Cancelled).
    pub fn cancel(&self) {
        let mut seen = HashSet::new();
        let mut stack = vec![self.clone()];
        while let Some(task) = stack.pop() {
            if !seen.insert(task.id()) || task.is_done() {
                continue;
            }
            task.0.request_cancel();
            stack.extend(task.0.dependents());
            stack.extend(task.0.dependencies());
            stack.extend(task.0.continuation());
        }
    }
}

impl PartialEq for TaskRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for TaskRef {}

impl Hash for TaskRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRef")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}

/// Typed handle to a task producing `T`.
pub struct Task<T> {
    inner: TaskRef,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Task<T> {
    pub(crate) fn from_ref(inner: TaskRef) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Type-erased handle to the same task.
    pub fn erase(&self) -> TaskRef {
        self.inner.clone()
    }

    /// Renames the task (builder style).
    #[must_use]
    pub fn with_name(self, name: impl Into<String>) -> Self {
        self.inner.set_name(name);
        self
    }

    /// Sets the significance (builder style).
    #[must_use]
    pub fn with_significance(self, significance: Significance) -> Self {
        self.inner.set_significance(significance);
        self
    }

    /// Assigns the stage this task reports to; children without a stage inherit it.
    #[must_use]
    pub fn with_stage(self, stage: impl Into<String>) -> Self {
        self.inner.0.set_stage(stage.into());
        self
    }

    /// Tags the task so its terminal transition bumps counter `key` by one.
    #[must_use]
    pub fn with_counter(self, key: impl Into<String>) -> Self {
        self.inner.0.set_counter(key.into());
        self
    }
}

impl<T: Clone + 'static> Task<T> {
    /// Result of a SUCCEEDED task.
    pub fn result(&self) -> Option<T> {
        self.inner.result_as::<T>()
    }
}

impl<T: Send + Sync + 'static> Task<T> {
    /// Resolves a pending task from outside with `value`. The body, if any, never runs.
    ///
    /// Returns `false` if the task was already terminal.
    pub fn complete(&self, value: T) -> bool {
        self.inner.0.complete(Outcome::Succeeded(Arc::new(value)))
    }

    /// Fails a pending task from outside. Returns `false` if it was already terminal.
    pub fn fail(&self, error: TaskError) -> bool {
        self.inner.0.complete(Outcome::Failed(error))
    }
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self::from_ref(self.inner.clone())
    }
}

impl<T> Deref for Task<T> {
    type Target = TaskRef;

    fn deref(&self) -> &TaskRef {
        &self.inner
    }
}

impl<T> From<Task<T>> for TaskRef {
    fn from(task: Task<T>) -> Self {
        task.inner
    }
}

impl<T> From<&Task<T>> for TaskRef {
    fn from(task: &Task<T>) -> Self {
        task.inner.clone()
    }
}

impl From<&TaskRef> for TaskRef {
    fn from(task: &TaskRef) -> Self {
        task.clone()
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("state", &self.state())
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}
