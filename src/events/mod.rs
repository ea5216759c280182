//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by executors, the runner, task
//! contexts and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `core::engine` (executor and terminal events), `core::runner`
//!   (`TaskRunning`), `TaskContext`/`PrepareContext` (properties, progress, messages),
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the executor's subscriber listener (fans out to `SubscriberSet`)
//!   and any receiver obtained from `TaskExecutor::subscribe`.
//!
//! See `core/mod.rs` for the system-level wiring diagram.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
