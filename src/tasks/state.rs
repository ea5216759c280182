//! # Task lifecycle state and significance.
//!
//! ```text
//! Pending ──► Running ──► Succeeded
//!    │           ├──────► Failed
//!    │           └──────► Cancelled
//!    ├──────────────────► Failed      (prepare error, strict dependent failed, rejected)
//!    └──────────────────► Cancelled   (cancel before start, cancelled dependent)
//! ```
//!
//! Transitions only move forward; a terminal state is final.

use serde::Serialize;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TaskState {
    /// Constructed or waiting on dependents.
    Pending,
    /// Body is executing (or a composed inner task is being awaited).
    Running,
    /// Finished with a result.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Cancelled before or during execution.
    Cancelled,
}

impl TaskState {
    /// Whether the state is final.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Cancelled
        )
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
        }
    }
}

/// How much a task's outcome matters to the surrounding operation.
///
/// - `Major`: shown to the user and fatal to the executor when it fails.
/// - `Moderate`: logged, not shown.
/// - `Minor`: neither logged nor shown; a failing minor root never fails its executor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Significance {
    #[default]
    Major,
    Moderate,
    Minor,
}

impl Significance {
    /// Transitions of this task are worth a log line.
    #[inline]
    pub fn should_log(self) -> bool {
        self != Significance::Minor
    }

    /// This task deserves a row in a progress UI.
    #[inline]
    pub fn should_show(self) -> bool {
        self == Significance::Major
    }
}
