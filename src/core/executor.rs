//! # TaskExecutor: resolve a task graph and drive it to completion.
//!
//! A [`TaskExecutor`] owns one bus, one progress tracker and the engine that arms
//! its roots. It is built with [`ExecutorBuilder`] and started exactly once.
//!
//! ## Lifecycle
//! ```text
//! TaskExecutor::builder(&schedulers)
//!     .root(task) / .roots(..) / .policy(..) / .subscribers(..)
//!     .build()
//!         │
//!         ├─ start()     resolve (sync, may fail with GraphError) → arm → return
//!         ├─ join()      async wait for ExecutorOutcome
//!         ├─ wait()      blocking wait (never call it from a scheduler thread the graph needs)
//!         ├─ run()       start + wait
//!         ├─ cancel()    idempotent, graph-wide, cooperative
//!         └─ on_complete(scheduler, f)   f(outcome) on the chosen scheduler
//! ```
//!
//! ## Example
//! ```no_run
//! use taskgraph::{Config, Schedulers, Task, TaskError, TaskExecutor};
//!
//! let schedulers = Schedulers::new(&Config::default())?;
//! let fetch = Task::supply_on("fetch", schedulers.io(), || Ok::<_, TaskError>(vec![1, 2, 3]));
//! let sum = fetch.then_apply(|v| Ok(v.iter().sum::<i32>()));
//! let shown = sum.when_complete_on(schedulers.ui(), |v, e| {
//!     println!("sum={v:?} error={e:?}");
//!     Ok(())
//! });
//!
//! let exec = TaskExecutor::builder(&schedulers).root(&shown).build();
//! exec.start()?;
//! assert!(exec.wait().is_success());
//! assert_eq!(sum.result(), Some(6));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};

use crate::config::Config;
use crate::core::engine::Engine;
use crate::error::{GraphError, RunError, TaskError};
use crate::events::{Bus, Event};
use crate::policies::FailurePolicy;
use crate::progress::{ProgressSnapshot, ProgressTracker};
use crate::schedulers::{SchedulerRef, Schedulers};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::tasks::{ExecEnv, Task, TaskRef};

static NEXT_EXECUTOR_ID: AtomicU64 = AtomicU64::new(1);

/// Final outcome of an executor.
#[derive(Debug, Clone)]
pub enum ExecutorOutcome {
    /// Every root succeeded (or failed with `Minor` significance).
    Succeeded,
    /// A root failed; under best-effort with several failures, an aggregate.
    Failed(TaskError),
    /// Cancellation was requested or a root ended cancelled.
    Cancelled,
}

impl ExecutorOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutorOutcome::Succeeded)
    }

    /// `Ok(())` on success; cancellation maps to [`TaskError::Cancelled`].
    pub fn into_result(self) -> Result<(), TaskError> {
        match self {
            ExecutorOutcome::Succeeded => Ok(()),
            ExecutorOutcome::Failed(e) => Err(e),
            ExecutorOutcome::Cancelled => Err(TaskError::Cancelled),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecutorOutcome::Succeeded => "succeeded",
            ExecutorOutcome::Failed(_) => "failed",
            ExecutorOutcome::Cancelled => "cancelled",
        }
    }
}

/// Builder for [`TaskExecutor`].
pub struct ExecutorBuilder {
    schedulers: Schedulers,
    cfg: Config,
    roots: Vec<TaskRef>,
    policy: Option<FailurePolicy>,
    default_scheduler: Option<SchedulerRef>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl ExecutorBuilder {
    fn new(schedulers: &Schedulers) -> Self {
        Self {
            schedulers: schedulers.clone(),
            cfg: Config::default(),
            roots: Vec::new(),
            policy: None,
            default_scheduler: None,
            subscribers: Vec::new(),
        }
    }

    /// Bus capacity, progress throttle and default failure policy.
    pub fn config(mut self, cfg: Config) -> Self {
        self.cfg = cfg;
        self
    }

    /// Adds a root task. Adding the same task twice has no effect.
    pub fn root(mut self, task: impl Into<TaskRef>) -> Self {
        let task = task.into();
        if !self.roots.contains(&task) {
            self.roots.push(task);
        }
        self
    }

    /// Adds several independent roots (a forest).
    pub fn roots<I>(self, tasks: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<TaskRef>,
    {
        tasks.into_iter().fold(self, |b, t| b.root(t))
    }

    /// Overrides [`Config::failure_policy`].
    pub fn policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Scheduler for tasks that did not pick one (default: `io`).
    pub fn default_scheduler(mut self, scheduler: SchedulerRef) -> Self {
        self.default_scheduler = Some(scheduler);
        self
    }

    /// Event subscribers, each fed through its own bounded queue.
    pub fn subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    pub fn build(self) -> TaskExecutor {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let env = Arc::new(ExecEnv {
            executor: NEXT_EXECUTOR_ID.fetch_add(1, Ordering::Relaxed),
            bus: bus.clone(),
            progress: Arc::new(ProgressTracker::new()),
            throttle: self.cfg.progress_throttle(),
        });
        let default_scheduler = self
            .default_scheduler
            .unwrap_or_else(|| self.schedulers.io());
        let engine = Engine::new(
            env,
            default_scheduler,
            self.policy.unwrap_or(self.cfg.failure_policy),
            self.roots,
        );

        if !self.subscribers.is_empty() {
            let rx = bus.subscribe();
            let handle = self.schedulers.handle();
            let set = SubscriberSet::new(self.subscribers, bus, handle);
            handle.spawn(subscriber_listener(rx, engine.done(), set));
        }
        TaskExecutor { engine }
    }
}

/// Forwards bus events to the subscriber set until the executor finishes.
///
/// Events already queued when it finishes (including `ExecutorStopped`) are still
/// delivered before the subscriber workers are shut down.
async fn subscriber_listener(
    mut rx: broadcast::Receiver<Event>,
    mut done: watch::Receiver<Option<ExecutorOutcome>>,
    set: SubscriberSet,
) {
    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Ok(ev) => set.emit(&ev),
                Err(RecvError::Lagged(_)) => {
                    set.emit(&Event::subscriber_overflow("subscriber_listener", "lagged"));
                }
                Err(RecvError::Closed) => break,
            },
            // Fires on the single `finish` send, or when the executor is dropped unstarted.
            _ = done.changed() => {
                while let Ok(ev) = rx.try_recv() {
                    set.emit(&ev);
                }
                break;
            }
        }
    }
    set.shutdown().await;
}

/// Drives one task graph (or forest) to completion.
pub struct TaskExecutor {
    engine: Arc<Engine>,
}

impl TaskExecutor {
    pub fn builder(schedulers: &Schedulers) -> ExecutorBuilder {
        ExecutorBuilder::new(schedulers)
    }

    /// Process-unique executor id, as carried by its events.
    pub fn id(&self) -> u64 {
        self.engine.id()
    }

    /// Resolves the graph and schedules its leaves. Returns once everything is armed.
    ///
    /// # Errors
    /// Construction errors ([`GraphError`]) are reported here, before anything runs.
    pub fn start(&self) -> Result<(), GraphError> {
        self.engine.start()
    }

    /// Waits for the executor to finish. Never resolves if it was not started.
    pub async fn join(&self) -> ExecutorOutcome {
        let mut rx = self.engine.done();
        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|done| done.clone());
        outcome.unwrap_or(ExecutorOutcome::Cancelled)
    }

    /// Blocks the calling thread until the executor finishes.
    ///
    /// Must not be called from a scheduler thread the graph still needs (the `ui`
    /// loop in particular), or it deadlocks.
    pub fn wait(&self) -> ExecutorOutcome {
        futures::executor::block_on(self.join())
    }

    /// [`start`](Self::start) followed by [`wait`](Self::wait).
    pub fn run(&self) -> Result<ExecutorOutcome, GraphError> {
        self.start()?;
        Ok(self.wait())
    }

    /// Outcome, once finished.
    pub fn outcome(&self) -> Option<ExecutorOutcome> {
        self.engine.outcome()
    }

    pub fn is_done(&self) -> bool {
        self.outcome().is_some()
    }

    /// Requests graph-wide cooperative cancellation. Idempotent.
    ///
    /// Pending tasks end CANCELLED without running; running bodies see their token
    /// fire. Calling it before [`start`](Self::start) makes every task end CANCELLED.
    pub fn cancel(&self) {
        self.engine.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.engine.is_cancelled()
    }

    /// Runs `f(outcome)` on `scheduler` once the executor finishes (right away if it has).
    pub fn on_complete<F>(&self, scheduler: SchedulerRef, f: F)
    where
        F: FnOnce(ExecutorOutcome) + Send + 'static,
    {
        self.engine.on_complete(scheduler, Box::new(f));
    }

    /// Stage counters of this executor.
    pub fn progress(&self) -> ProgressSnapshot {
        self.engine.env().progress.snapshot()
    }

    /// Raw receiver of this executor's events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.engine.env().bus.subscribe()
    }

    pub fn roots(&self) -> &[TaskRef] {
        self.engine.roots()
    }

    /// Names of tasks currently running, sorted.
    pub fn running_tasks(&self) -> Vec<String> {
        self.engine.registry().running()
    }

    /// Number of tasks armed so far (grows as composed tasks are discovered).
    pub fn task_count(&self) -> usize {
        self.engine.registry().len()
    }
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("id", &self.id())
            .field("roots", &self.engine.roots().len())
            .field("tasks", &self.task_count())
            .field("outcome", &self.outcome())
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> Task<T> {
    /// Executor with this task as its only root.
    pub fn executor(&self, schedulers: &Schedulers) -> TaskExecutor {
        TaskExecutor::builder(schedulers).root(self).build()
    }

    /// Starts this task on a fresh executor.
    pub fn start(&self, schedulers: &Schedulers) -> Result<TaskExecutor, GraphError> {
        let exec = self.executor(schedulers);
        exec.start()?;
        Ok(exec)
    }

    /// Runs this task to completion, blocking the calling thread.
    pub fn run(&self, schedulers: &Schedulers) -> Result<T, RunError> {
        let exec = self.start(schedulers)?;
        exec.wait();
        self.outcome_value()
    }

    /// Runs this task to completion.
    pub async fn run_async(&self, schedulers: &Schedulers) -> Result<T, RunError> {
        let exec = self.start(schedulers)?;
        exec.join().await;
        self.outcome_value()
    }

    fn outcome_value(&self) -> Result<T, RunError> {
        match self.result() {
            Some(value) => Ok(value),
            None => Err(self.error().unwrap_or(TaskError::Cancelled).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_into_result() {
        assert!(ExecutorOutcome::Succeeded.into_result().is_ok());
        let err = ExecutorOutcome::Cancelled.into_result().unwrap_err();
        assert!(err.is_cancelled());
        let err = ExecutorOutcome::Failed(TaskError::fail("x"))
            .into_result()
            .unwrap_err();
        assert_eq!(err.as_label(), "task_failed");
        assert_eq!(ExecutorOutcome::Cancelled.as_label(), "cancelled");
    }

    #[test]
    fn test_builder_dedups_roots_and_rejects_empty() {
        let schedulers = Schedulers::new(&Config::default()).unwrap();
        let t = Task::run_fn("t", || Ok(()));
        let exec = TaskExecutor::builder(&schedulers)
            .root(&t)
            .root(t.erase())
            .build();
        assert_eq!(exec.roots().len(), 1);

        let empty = TaskExecutor::builder(&schedulers).build();
        assert_eq!(empty.start().unwrap_err(), GraphError::NoRoots);
        schedulers.shutdown();
    }
}
