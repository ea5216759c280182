//! Error types used by the taskgraph executor, schedulers and tasks.
//!
//! This module defines four error enums:
//!
//! - [`TaskError`]: the outcome of a failed or cancelled task. Stored in the task's
//!   error slot and observed by every waiter, hence `Clone`.
//! - [`GraphError`]: construction errors (cycles, double submission). Raised
//!   synchronously by [`TaskExecutor::start`](crate::TaskExecutor::start), never stored
//!   as a task failure.
//! - [`SchedulerError`]: a scheduler could not be built or refused a job.
//! - [`RunError`]: what the blocking `run` helpers return: either of the first two.
//!
//! All types provide `as_label` (stable snake_case label for logs/metrics).

use std::sync::Arc;

use thiserror::Error;

/// # Errors produced by task execution.
///
/// Body errors, dependency short-circuits, panics and cancellation all end up here.
/// A task never rethrows on the executing thread: the error is captured into the
/// task and observed by polling or callback.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    /// The task body (or a combinator function) returned an error.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// A dependent of a strict (relying) task did not succeed.
    #[error("dependent task {task:?} failed: {source}")]
    DependentFailed {
        /// Name of the failing dependent.
        task: String,
        /// The dependent's own error.
        #[source]
        source: Arc<TaskError>,
    },

    /// A follow-up task of a task relying on its dependencies did not succeed.
    #[error("dependency task {task:?} failed: {source}")]
    DependencyFailed {
        /// Name of the failing dependency.
        task: String,
        /// The dependency's own error.
        #[source]
        source: Arc<TaskError>,
    },

    /// Several tasks failed; produced by [`TaskContext::check_dependents`](crate::TaskContext::check_dependents)
    /// and by best-effort executors.
    #[error("{failed} of {total} tasks failed")]
    Aggregate {
        /// Number of failed (or cancelled) tasks.
        failed: usize,
        /// Number of tasks inspected.
        total: usize,
        /// `(task name, error)` for every failed task, in inspection order.
        errors: Vec<(String, TaskError)>,
    },

    /// The task body panicked.
    #[error("task panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// The task's scheduler refused the job (shut down).
    #[error("scheduler {scheduler:?} rejected the task: {reason}")]
    Rejected {
        /// Scheduler name.
        scheduler: String,
        /// Why the job was refused.
        reason: String,
    },

    /// A task graph discovered at runtime (through `then_compose`) was invalid.
    #[error("invalid task graph: {error}")]
    Graph {
        /// The construction error, rendered.
        error: String,
    },

    /// Task was cancelled.
    #[error("task cancelled")]
    Cancelled,
}

impl TaskError {
    /// Builds a [`TaskError::Fail`] from anything printable.
    ///
    /// # Example
    /// ```
    /// use taskgraph::TaskError;
    ///
    /// let err = TaskError::fail("connection reset");
    /// assert_eq!(err.to_string(), "execution failed: connection reset");
    /// ```
    pub fn fail(error: impl std::fmt::Display) -> Self {
        TaskError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskgraph::TaskError;
    ///
    /// assert_eq!(TaskError::Cancelled.as_label(), "task_cancelled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::DependentFailed { .. } => "task_dependent_failed",
            TaskError::DependencyFailed { .. } => "task_dependency_failed",
            TaskError::Aggregate { .. } => "task_aggregate_failed",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::Rejected { .. } => "task_rejected",
            TaskError::Graph { .. } => "task_invalid_graph",
            TaskError::Cancelled => "task_cancelled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::DependentFailed { task, source } => {
                format!("dependent {task:?}: {}", source.as_message())
            }
            TaskError::DependencyFailed { task, source } => {
                format!("dependency {task:?}: {}", source.as_message())
            }
            TaskError::Aggregate { failed, total, .. } => format!("{failed} of {total} failed"),
            TaskError::Panicked { info } => format!("panic: {info}"),
            TaskError::Rejected { scheduler, reason } => {
                format!("rejected by {scheduler:?}: {reason}")
            }
            TaskError::Graph { error } => format!("graph: {error}"),
            TaskError::Cancelled => "cancelled".to_string(),
        }
    }

    /// Returns `true` for [`TaskError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }

    /// Follows [`TaskError::DependentFailed`] and [`TaskError::DependencyFailed`] wrappers down to the error that started the chain.
    ///
    /// # Example
    /// ```
    /// use std::sync::Arc;
    /// use taskgraph::TaskError;
    ///
    /// let inner = TaskError::fail("404");
    /// let wrapped = TaskError::DependentFailed { task: "fetch".into(), source: Arc::new(inner) };
    /// assert_eq!(wrapped.root_cause().as_label(), "task_failed");
    /// ```
    pub fn root_cause(&self) -> &TaskError {
        let mut cur = self;
        while let TaskError::DependentFailed { source, .. }
        | TaskError::DependencyFailed { source, .. } = cur
        {
            cur = source.as_ref();
        }
        cur
    }
}

impl From<std::io::Error> for TaskError {
    fn from(err: std::io::Error) -> Self {
        TaskError::fail(err)
    }
}

/// # Construction errors.
///
/// Programming errors in the shape of a task graph. They are reported synchronously
/// at the point of misuse and are never wrapped as task failures.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A task (transitively) depends on one of its ancestors.
    #[error("dependency cycle: {}", path.join(" -> "))]
    Cycle {
        /// Task names along the cycle; the first and last entries are the same task.
        path: Vec<String>,
    },

    /// A root task was already terminal or owned by another executor.
    #[error("task {task:?} was already submitted")]
    AlreadySubmitted {
        /// Name of the offending task.
        task: String,
    },

    /// `start` was called twice on the same executor.
    #[error("executor already started")]
    AlreadyStarted,

    /// The executor was built without any root task.
    #[error("executor has no root tasks")]
    NoRoots,
}

impl GraphError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            GraphError::Cycle { .. } => "graph_cycle",
            GraphError::AlreadySubmitted { .. } => "graph_already_submitted",
            GraphError::AlreadyStarted => "graph_already_started",
            GraphError::NoRoots => "graph_no_roots",
        }
    }
}

/// # Scheduler errors.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum SchedulerError {
    /// The scheduler was shut down and accepts no more work.
    #[error("scheduler {scheduler:?} is closed")]
    Closed {
        /// Scheduler name.
        scheduler: String,
    },

    /// A job was submitted to the direct scheduler from outside any tokio runtime.
    #[error("no tokio runtime is running on the submitting thread")]
    NoRuntime,

    /// The backing runtime or thread could not be created.
    #[error("failed to start scheduler runtime: {error}")]
    Runtime {
        /// The underlying I/O error message.
        error: String,
    },
}

impl SchedulerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SchedulerError::Closed { .. } => "scheduler_closed",
            SchedulerError::NoRuntime => "scheduler_no_runtime",
            SchedulerError::Runtime { .. } => "scheduler_runtime",
        }
    }
}

/// Error returned by the blocking and async `run` helpers.
#[derive(Error, Debug, Clone)]
pub enum RunError {
    /// The graph could not be submitted.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// The root task did not succeed.
    #[error(transparent)]
    Task(#[from] TaskError),
}

impl RunError {
    /// Returns the task error, if execution got that far.
    pub fn task_error(&self) -> Option<&TaskError> {
        match self {
            RunError::Task(e) => Some(e),
            RunError::Graph(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_unwraps_nested_dependents() {
        let leaf = TaskError::fail("disk full");
        let mid = TaskError::DependencyFailed {
            task: "write".into(),
            source: Arc::new(leaf),
        };
        let top = TaskError::DependentFailed {
            task: "install".into(),
            source: Arc::new(mid.clone()),
        };
        assert!(matches!(top.root_cause(), TaskError::Fail { error } if error == "disk full"));
        assert_eq!(top.as_label(), "task_dependent_failed");
        assert_eq!(mid.as_label(), "task_dependency_failed");
    }

    #[test]
    fn test_cycle_display_joins_path() {
        let err = GraphError::Cycle {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle: a -> b -> a");
        assert_eq!(err.as_label(), "graph_cycle");
    }

    #[test]
    fn test_io_error_becomes_fail() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "reset");
        let err: TaskError = io.into();
        assert_eq!(err.as_label(), "task_failed");
        assert!(!err.is_cancelled());
    }
}
