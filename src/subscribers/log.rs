//! # Logging subscriber for debugging and demos.
//!
//! [`LogWriter`] renders executor events through `tracing`, one line per event.
//! Events of `Minor` tasks are skipped, like the engine's own logs.
//!
//! ## Output format
//! ```text
//! INFO  executor=3 tasks=5 policy="fail_fast" [executor-started]
//! DEBUG task="check:mod-a" stage="mods" [running]
//! INFO  task="check:mod-b" stage="mods" count=2 [counter]
//! WARN  task="check:mod-c" reason="execution failed: 404" [failed]
//! INFO  executor=3 outcome="failed" [executor-stopped]
//! ```
//!
//! ## Example
//! ```no_run
//! # use std::sync::Arc;
//! # use taskgraph::{Config, LogWriter, Schedulers, Task, TaskExecutor};
//! let schedulers = Schedulers::new(&Config::default())?;
//! let task = Task::run_fn("noop", || Ok(()));
//! let exec = TaskExecutor::builder(&schedulers)
//!     .root(&task)
//!     .subscribers(vec![Arc::new(LogWriter)])
//!     .build();
//! exec.run()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// `tracing`-backed logging subscriber.
///
/// Enabled via the `logging` feature. Useful for development and demos; implement a
/// custom [`Subscribe`] for structured metrics.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        if e.significance.is_some_and(|s| !s.should_log()) {
            return;
        }
        let task = e.task.as_deref().unwrap_or("-");
        let stage = e.stage.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::ExecutorStarted => info!(
                executor = e.executor,
                tasks = e.count,
                policy = e.reason.as_deref(),
                "[executor-started]"
            ),
            EventKind::ExecutorStopped => info!(
                executor = e.executor,
                outcome = e.reason.as_deref(),
                tasks = e.count,
                "[executor-stopped]"
            ),
            EventKind::CancelRequested => info!(executor = e.executor, "[cancel-requested]"),
            EventKind::TaskReady => debug!(task, stage, "[ready]"),
            EventKind::TaskRunning => debug!(task, stage, "[running]"),
            EventKind::TaskSucceeded => info!(task, stage, "[succeeded]"),
            EventKind::TaskFailed => warn!(task, stage, reason = e.reason.as_deref(), "[failed]"),
            EventKind::TaskCancelled => info!(task, stage, "[cancelled]"),
            EventKind::PropertiesUpdated => debug!(task, key = e.reason.as_deref(), "[property]"),
            EventKind::ProgressUpdated => debug!(task, progress = e.progress, "[progress]"),
            EventKind::MessageUpdated => info!(task, message = e.reason.as_deref(), "[message]"),
            EventKind::CounterIncremented => info!(task, stage, count = e.count, "[counter]"),
            EventKind::SubscriberPanicked => {
                warn!(subscriber = task, info = e.reason.as_deref(), "[subscriber-panicked]")
            }
            EventKind::SubscriberOverflow => {
                warn!(subscriber = task, reason = e.reason.as_deref(), "[subscriber-overflow]")
            }
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
