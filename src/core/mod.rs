//! Runtime core: graph resolution and execution.
//!
//! The only public API from this module is [`TaskExecutor`] (with its builder and
//! outcome). Everything else is wired together internally:
//!
//! ```text
//! TaskExecutor::start
//!     └─► graph::resolve   (claims, prepare hooks, cycle detection) ─► Plan
//!     └─► Engine::arm      (registry, watchers, latches)
//!              └─► Engine::dispatch ─► Scheduler::submit(runner::run_node)
//!                                              └─► node.complete ─► waiters ─► dispatch ...
//! ```
//!
//! Internal modules:
//! - [`graph`]: depth-first resolution into a post-order plan;
//! - [`latch`]: per-node countdown firing dispatch;
//! - [`runner`]: runs one body with panic capture;
//! - [`engine`]: dispatch, composition, root accounting, completion hooks;
//! - [`registry`]: tasks armed by one executor.

mod engine;
mod executor;
mod graph;
mod latch;
mod registry;
mod runner;

pub use executor::{ExecutorBuilder, ExecutorOutcome, TaskExecutor};

pub(crate) use runner::panic_message;
