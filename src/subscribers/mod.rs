//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and,
//! behind the `logging` feature, the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Engine / runner / TaskContext ── publish(Event) ──► Bus
//!                                                      │
//!                                     subscriber_listener (per executor)
//!                                                      │
//!                                                SubscriberSet
//!                                          ┌───────────┼───────────┐
//!                                          ▼           ▼           ▼
//!                                      LogWriter   ProgressUi    Custom
//! ```
//!
//! Subscribers are passed to
//! [`ExecutorBuilder::subscribers`](crate::ExecutorBuilder::subscribers). Callers
//! that prefer pulling can use [`TaskExecutor::subscribe`](crate::TaskExecutor::subscribe)
//! for a raw broadcast receiver instead.

#[cfg(feature = "logging")]
mod log;
mod subscribe;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
