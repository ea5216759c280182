//! # Counting latch.
//!
//! One latch per armed node. It starts at `dependents + 1`; every dependent's
//! terminal transition counts it down, and the arming engine releases the extra
//! guard once all waiters are attached. Whoever brings it to zero dispatches the node,
//! so dispatch happens exactly once and never before every dependent is terminal.

use std::sync::atomic::{AtomicUsize, Ordering};

pub(crate) struct Latch {
    remaining: AtomicUsize,
}

impl Latch {
    pub(crate) fn new(count: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(count),
        }
    }

    /// Decrements the count; `true` for the call that reached zero.
    pub(crate) fn count_down(&self) -> bool {
        let prev = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        matches!(prev, Ok(1))
    }

    #[cfg(test)]
    fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_fires_once_at_zero() {
        let latch = Latch::new(3);
        assert!(!latch.count_down());
        assert!(!latch.count_down());
        assert!(latch.count_down());
        assert!(!latch.count_down(), "never fires twice");
        assert_eq!(latch.remaining(), 0);
    }

    #[test]
    fn test_concurrent_count_down_fires_exactly_once() {
        let latch = Arc::new(Latch::new(64));
        let handles: Vec<_> = (0..64)
            .map(|_| {
                let l = Arc::clone(&latch);
                std::thread::spawn(move || l.count_down())
            })
            .collect();
        let fired = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|f| *f)
            .count();
        assert_eq!(fired, 1);
    }
}
