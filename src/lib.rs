//! # taskgraph
//!
//! **taskgraph** is a cooperative task-dependency executor.
//!
//! A [`Task`] is a unit of asynchronous work that declares its own upstream
//! dependencies, can be chained and composed with other tasks, runs on a chosen
//! [`Scheduler`] (the background `io` pool or the serialized `ui` loop), reports
//! hierarchical progress, and propagates failure and cancellation through its
//! dependency graph.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   Task::supply / TaskBuilder      then_apply / then_compose / when_complete
//!            │                                   │
//!            └──────────────┬────────────────────┘
//!                           ▼
//!                   graph of Task nodes (pure data)
//!                           │ TaskExecutor::start
//!                           ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  TaskExecutor                                                     │
//! │  - graph::resolve (prepare hooks, cycle check, dedup, claims)     │
//! │  - Engine (latches, dispatch, compose, root accounting)           │
//! │  - Registry (tasks armed by this executor)                        │
//! │  - ProgressTracker (stage counters)                               │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!   ┌──────────┐      ┌──────────┐      ┌──────────┐           │
//!   │ io pool  │      │ io pool  │      │ ui loop  │           │
//!   │ run_node │      │ run_node │      │ run_node │           │
//!   └────┬─────┘      └────┬─────┘      └────┬─────┘           │
//!        │ TaskRunning     │ TaskFailed      │ TaskSucceeded   │ ExecutorStarted
//!        ▼                 ▼                 ▼                 ▼ ExecutorStopped
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                      Bus (broadcast channel)                      │
//! │                   (capacity: Config::bus_capacity)                │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                          subscriber_listener
//!                                   ▼
//!                             SubscriberSet
//!                        ┌─────────┼─────────┐
//!                        ▼         ▼         ▼
//!                     worker1   worker2   workerN
//! ```
//!
//! ### Lifecycle of a node
//! ```text
//! Pending ──(all dependents terminal)──► dispatch
//!    ├─ cancelled                       ─► Cancelled
//!    ├─ relying + dependent failed       ─► Failed(DependentFailed)   body skipped
//!    ├─ manual                           ─► waits for complete()/fail()
//!    └─ scheduler.submit(run_node)
//!          └─ Running ─► body(ctx)
//!                ├─ Ok(value)        ─► Succeeded, or run dependencies + post hook first
//!                ├─ Ok(inner task)   ─► resolve inner, finish with its outcome
//!                ├─ Err(Cancelled)   ─► Cancelled
//!                ├─ Err(e) / panic   ─► Failed
//! terminal ─► counter += 1, TaskXxx event, dependers' latches count down
//! ```
//!
//! ## Features
//! | Area              | Description                                                      | Key types / traits                          |
//! |-------------------|------------------------------------------------------------------|---------------------------------------------|
//! | **Tasks**         | Leaf tasks, explicit builder, combinators, manual stubs.         | [`Task`], [`TaskBuilder`], [`TaskRef`]      |
//! | **Execution**     | Resolve, run, cancel, wait, completion hooks on a scheduler.     | [`TaskExecutor`], [`ExecutorOutcome`]       |
//! | **Schedulers**    | Background pool, serialized UI loop, ambient runtime.            | [`Scheduler`], [`Schedulers`]               |
//! | **Progress**      | Stage counters, per-task progress, properties and messages.      | [`ProgressSnapshot`], [`TaskContext`]       |
//! | **Subscriber API**| Observe lifecycle and progress events.                           | [`Subscribe`], [`Event`]                    |
//! | **Policies**      | Fail-fast or best-effort forests.                                | [`FailurePolicy`]                           |
//! | **Errors**        | Typed errors for tasks, graphs and schedulers.                   | [`TaskError`], [`GraphError`], [`RunError`] |
//! | **Configuration** | Scheduler sizing, bus capacity, progress throttle.               | [`Config`]                                  |
//!
//! ## Optional features
//! - `logging`: exports the `tracing`-backed [`LogWriter`] subscriber.
//!
//! ## Example
//! ```no_run
//! use taskgraph::{Config, Schedulers, Significance, Task, TaskBuilder, TaskError};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let schedulers = Schedulers::new(&Config::default())?;
//!
//!     let mods = ["alpha", "beta", "gamma"];
//!     let io = schedulers.io();
//!     let check = TaskBuilder::new("check-updates")
//!         .with_stage("mods")
//!         .with_relying(false)
//!         .with_pre_execute(move |ctx| {
//!             ctx.set_total(mods.len() as u64);
//!             Ok(mods
//!                 .iter()
//!                 .map(|m| {
//!                     let m = m.to_string();
//!                     Task::supply_on(format!("check:{m}"), io.clone(), move || {
//!                         Ok::<_, TaskError>(format!("{m}: up to date"))
//!                     })
//!                     .with_counter("mods")
//!                     .with_significance(Significance::Minor)
//!                     .erase()
//!                 })
//!                 .collect())
//!         })
//!         .build(|ctx| async move {
//!             let results: Vec<String> = ctx
//!                 .dependents()
//!                 .iter()
//!                 .filter_map(|t| t.result_as::<String>())
//!                 .collect();
//!             Ok(results)
//!         });
//!
//!     let shown = check.when_complete_on(schedulers.ui(), |lines, err| {
//!         println!("{lines:?} {err:?}");
//!         Ok(())
//!     });
//!     shown.run(&schedulers)?;
//!     schedulers.shutdown();
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod policies;
mod progress;
mod schedulers;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use config::Config;
pub use core::{ExecutorBuilder, ExecutorOutcome, TaskExecutor};
pub use error::{GraphError, RunError, SchedulerError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use policies::FailurePolicy;
pub use progress::{ProgressSnapshot, ProgressTracker, StageProgress};
pub use schedulers::{
    DirectScheduler, IoScheduler, Job, Scheduler, SchedulerRef, Schedulers, UiScheduler,
};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{
    PostExecuteContext, PrepareContext, Significance, TOTAL_PROPERTY, Task, TaskBuilder,
    TaskContext, TaskRef, TaskState,
};

// Optional: expose the built-in logging subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
