//! Progress aggregation.
//!
//! A side channel next to the graph: counter-tagged tasks bump a per-stage counter
//! when they terminate, and stage owners announce the expected total through their
//! `"total"` property. Observers poll [`ProgressTracker::snapshot`] (safe from the ui
//! thread; no graph lock is taken) or listen for `CounterIncremented` events.
//!
//! Removing every counter changes nothing about success or failure.

mod tracker;

pub use tracker::{ProgressSnapshot, ProgressTracker, StageProgress};
