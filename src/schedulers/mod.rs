//! # Execution contexts with thread affinity.
//!
//! A task body runs on the scheduler it names; a task that names none runs on the
//! executor's default scheduler (`io` unless configured otherwise).
//!
//! ## Built-ins
//! ```text
//! io      multi-thread runtime, oversubscribed, optional admission semaphore
//! ui      one OS thread, FIFO queue, jobs strictly serialized
//! direct  the tokio runtime of whoever submits (tests)
//! ```
//!
//! ## Wiring
//! ```text
//! Config ──► Schedulers::new ──► { IoScheduler, UiScheduler, DirectScheduler, extras }
//!                                      │
//!   TaskBuilder::scheduler(s.ui()) ◄───┤   (per-task affinity)
//!   ExecutorBuilder::default_scheduler ◄┘  (fallback)
//! ```

mod direct;
mod io;
mod registry;
mod scheduler;
mod ui;

pub use direct::DirectScheduler;
pub use io::IoScheduler;
pub use registry::Schedulers;
pub use scheduler::{Job, Scheduler, SchedulerRef};
pub use ui::UiScheduler;
