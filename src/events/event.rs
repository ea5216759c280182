//! # Runtime events emitted by executors, the runner and subscriber workers.
//!
//! [`EventKind`] groups events into:
//! - executor events (started, stopped, cancel requested);
//! - task lifecycle events (ready, running, succeeded, failed, cancelled);
//! - progress events (properties, fractional progress, messages, stage counters);
//! - subscriber health (panics, dropped events).
//!
//! An [`Event`] is a flat record; which optional fields are set depends on the kind.
//!
//! ## Ordering
//! `seq` is process-wide and strictly increasing. Subscribers that receive events from
//! several queues can sort by it.
//!
//! ## Example
//! ```rust
//! use taskgraph::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskFailed)
//!     .with_task("fetch-mod-42")
//!     .with_reason("connection reset")
//!     .with_stage("mods.check_updates");
//!
//! assert_eq!(ev.kind, EventKind::TaskFailed);
//! assert_eq!(ev.task.as_deref(), Some("fetch-mod-42"));
//! assert_eq!(ev.reason.as_deref(), Some("connection reset"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::tasks::{Significance, TaskRef};

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Executor events ===
    /// Executor resolved its graph and scheduled the leaves.
    ///
    /// Sets:
    /// - `executor`: executor id
    /// - `count`: number of tasks claimed by the executor
    ExecutorStarted,

    /// All roots of the executor reached a terminal state.
    ///
    /// Sets:
    /// - `executor`: executor id
    /// - `reason`: `succeeded`, `cancelled` or the error message
    ExecutorStopped,

    /// `cancel()` was called on the executor.
    ///
    /// Sets:
    /// - `executor`: executor id
    CancelRequested,

    // === Task lifecycle events ===
    /// Task was claimed by an executor and its dependents are being awaited.
    ///
    /// Sets:
    /// - `task`, `task_id`, `stage`, `significance`
    TaskReady,

    /// Task body started on its scheduler.
    ///
    /// Sets:
    /// - `task`, `task_id`, `stage`, `significance`
    TaskRunning,

    /// Task reached SUCCEEDED.
    ///
    /// Sets:
    /// - `task`, `task_id`, `stage`, `significance`
    TaskSucceeded,

    /// Task reached FAILED.
    ///
    /// Sets:
    /// - `task`, `task_id`, `stage`, `significance`
    /// - `reason`: error message
    TaskFailed,

    /// Task reached CANCELLED.
    ///
    /// Sets:
    /// - `task`, `task_id`, `stage`, `significance`
    TaskCancelled,

    // === Progress events ===
    /// A task property changed.
    ///
    /// Sets:
    /// - `task`, `task_id`
    /// - `reason`: property key
    PropertiesUpdated,

    /// A task reported fractional progress.
    ///
    /// Sets:
    /// - `task`, `task_id`
    /// - `progress`: value in `[0, 1]`
    ProgressUpdated,

    /// A task reported a status message.
    ///
    /// Sets:
    /// - `task`, `task_id`
    /// - `reason`: the message
    MessageUpdated,

    /// A counter-tagged task terminated and bumped its counter.
    ///
    /// Sets:
    /// - `task`, `task_id`
    /// - `stage`: counter key
    /// - `count`: counter value after the increment
    CounterIncremented,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Id of the executor that published the event.
    pub executor: Option<u64>,
    /// Name of the task, if applicable.
    pub task: Option<Arc<str>>,
    /// Identity of the task, if applicable.
    pub task_id: Option<u64>,
    /// Stage (or counter key) the task reports to.
    pub stage: Option<Arc<str>>,
    /// Significance of the task at publish time.
    pub significance: Option<Significance>,
    /// Human-readable reason (errors, property keys, messages).
    pub reason: Option<Arc<str>>,
    /// Fractional progress in `[0, 1]`.
    pub progress: Option<f64>,
    /// Count payload (counter value, number of tasks).
    pub count: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            executor: None,
            task: None,
            task_id: None,
            stage: None,
            significance: None,
            reason: None,
            progress: None,
            count: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a stage or counter key.
    #[inline]
    pub fn with_stage(mut self, stage: impl Into<Arc<str>>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Attaches the executor id.
    #[inline]
    pub fn with_executor(mut self, id: u64) -> Self {
        self.executor = Some(id);
        self
    }

    /// Attaches a progress value.
    #[inline]
    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Attaches a count.
    #[inline]
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    /// Attaches name, id, stage and significance of a task.
    pub(crate) fn with_node(mut self, task: &TaskRef) -> Self {
        self.task = Some(task.name().into());
        self.task_id = Some(task.id());
        self.stage = task.stage().map(Into::into);
        self.significance = Some(task.significance());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }

    /// Whether this event reports a terminal task transition.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::TaskSucceeded | EventKind::TaskFailed | EventKind::TaskCancelled
        )
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::TaskReady);
        let b = Event::new(EventKind::TaskRunning);
        assert!(b.seq > a.seq, "later events get larger seq");
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(Event::new(EventKind::TaskCancelled).is_terminal());
        assert!(Event::new(EventKind::TaskSucceeded).is_terminal());
        assert!(!Event::new(EventKind::TaskRunning).is_terminal());
        assert!(Event::subscriber_overflow("audit", "full").is_subscriber_overflow());
    }
}
