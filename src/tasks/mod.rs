//! # Tasks: units of work with declared upstream dependencies.
//!
//! - [`Task<T>`] - typed handle; combinators and run helpers live here
//! - [`TaskRef`] - type-erased handle used for dependents and observation
//! - [`TaskBuilder`] - explicit constructor (prepare hook, body, flags)
//! - [`TaskContext`] / [`PrepareContext`] / [`PostExecuteContext`] - what task code can see and report
//! - [`TaskState`] / [`Significance`] - lifecycle and importance
//!
//! A task is pure data until an executor resolves and runs it; constructing and
//! composing tasks never schedules anything.

mod builder;
mod combinators;
mod context;
mod handle;
pub(crate) mod node;
mod state;
mod task_fn;

pub use builder::TaskBuilder;
pub use context::{PostExecuteContext, PrepareContext, TOTAL_PROPERTY, TaskContext};
pub use handle::{Task, TaskRef};
pub use state::{Significance, TaskState};

pub(crate) use context::ExecEnv;
