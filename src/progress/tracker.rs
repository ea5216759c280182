//! # ProgressTracker – per-stage completion counters
//!
//! Keeps `done`/`total` pairs per stage name. Counters are atomics; the map lock is
//! held only to find or insert a stage, never across task execution.
//!
//! ## Behavior
//! - `increment(stage)` is called exactly once per terminal transition of a
//!   counter-tagged task (success, failure or cancellation).
//! - `set_total(stage, n)` comes from the `"total"` property of the task owning the stage.
//! - `snapshot()` is eventually consistent: a reader may observe a stage between two
//!   increments, never a torn value.
//!
//! ## Internal scheme
//! ```text
//! stages: RwLock<HashMap<String, Arc<StageCounter>>>
//!                                 └─ done: AtomicU64, total: AtomicU64 (0 = unknown)
//!
//! snapshot() -> ProgressSnapshot { stages: BTreeMap<String, StageProgress> }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;

#[derive(Default)]
struct StageCounter {
    done: AtomicU64,
    total: AtomicU64,
}

impl StageCounter {
    fn view(&self) -> StageProgress {
        let total = self.total.load(Ordering::Acquire);
        StageProgress {
            done: self.done.load(Ordering::Acquire),
            total: (total > 0).then_some(total),
        }
    }
}

/// Completion of one stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StageProgress {
    /// Terminated counter-tagged tasks.
    pub done: u64,
    /// Expected number of tasks, when announced.
    pub total: Option<u64>,
}

impl StageProgress {
    /// `done / total` clamped to `[0, 1]`; `None` while the total is unknown.
    pub fn fraction(&self) -> Option<f64> {
        self.total
            .map(|total| (self.done as f64 / total as f64).clamp(0.0, 1.0))
    }
}

/// Point-in-time copy of every stage.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    /// Stage name → progress, sorted by name.
    pub stages: BTreeMap<String, StageProgress>,
}

impl ProgressSnapshot {
    /// Progress of one stage.
    pub fn stage(&self, name: &str) -> Option<StageProgress> {
        self.stages.get(name).copied()
    }

    /// Overall fraction across stages that know their total.
    ///
    /// Returns `None` if no stage announced a total.
    pub fn fraction(&self) -> Option<f64> {
        let (done, total) = self
            .stages
            .values()
            .filter_map(|s| s.total.map(|t| (s.done.min(t), t)))
            .fold((0u64, 0u64), |(d, t), (sd, st)| (d + sd, t + st));
        (total > 0).then(|| done as f64 / total as f64)
    }
}

/// Thread-safe stage counters shared by an executor and its observers.
#[derive(Default)]
pub struct ProgressTracker {
    stages: RwLock<HashMap<String, Arc<StageCounter>>>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, stage: &str) -> Arc<StageCounter> {
        if let Some(c) = self.stages.read().get(stage) {
            return Arc::clone(c);
        }
        let mut g = self.stages.write();
        Arc::clone(g.entry(stage.to_owned()).or_default())
    }

    /// Adds one finished task to `stage` and returns the new count.
    pub fn increment(&self, stage: &str) -> u64 {
        self.counter(stage).done.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Announces how many tasks `stage` expects.
    pub fn set_total(&self, stage: &str, total: u64) {
        self.counter(stage).total.store(total, Ordering::Release);
    }

    /// Progress of one stage, if it was ever touched.
    pub fn get(&self, stage: &str) -> Option<StageProgress> {
        self.stages.read().get(stage).map(|c| c.view())
    }

    /// Returns a copy of every stage.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        let g = self.stages.read();
        ProgressSnapshot {
            stages: g.iter().map(|(k, c)| (k.clone(), c.view())).collect(),
        }
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ProgressTracker").field(&self.snapshot()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_and_total() {
        let t = ProgressTracker::new();
        t.set_total("mods", 3);
        assert_eq!(t.increment("mods"), 1);
        assert_eq!(t.increment("mods"), 2);

        let p = t.get("mods").expect("stage exists");
        assert_eq!(p, StageProgress { done: 2, total: Some(3) });
        let frac = p.fraction().expect("total known");
        assert!((frac - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_total_has_no_fraction() {
        let t = ProgressTracker::new();
        t.increment("downloads");
        let snap = t.snapshot();
        assert_eq!(snap.stage("downloads").and_then(|s| s.fraction()), None);
        assert_eq!(snap.fraction(), None);
    }

    #[test]
    fn test_overall_fraction_ignores_stages_without_total() {
        let t = ProgressTracker::new();
        t.set_total("a", 4);
        t.set_total("b", 4);
        t.increment("a");
        t.increment("b");
        t.increment("b");
        t.increment("loose");
        let frac = t.snapshot().fraction().expect("totals known");
        assert!((frac - 3.0 / 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_concurrent_increments_are_exact() {
        let t = Arc::new(ProgressTracker::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let t = Arc::clone(&t);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        t.increment("hot");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread");
        }
        assert_eq!(t.get("hot").map(|p| p.done), Some(8000));
    }
}
