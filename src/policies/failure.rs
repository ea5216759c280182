//! # Failure policy for executors with several roots.
//!
//! [`FailurePolicy`] decides how the outcome of a forest of independent roots is
//! rolled up into one executor outcome.
//!
//! ```text
//! FailFast    → first non-minor root failure cancels the other roots
//!               and becomes the executor error
//! BestEffort  → every root runs to completion; failures are aggregated
//!               ("2 of 5 tasks failed")
//! ```
//!
//! Roots marked [`Significance::Minor`](crate::Significance::Minor) never fail the
//! executor under either policy.

/// Policy controlling how root failures are rolled up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Any failing root fails the executor and cancels the rest (default).
    #[default]
    FailFast,
    /// Every root runs; the executor fails only after all roots are terminal.
    BestEffort,
}

impl FailurePolicy {
    /// Whether a root failure should cancel the remaining roots.
    #[inline]
    pub fn cancels_siblings(self) -> bool {
        matches!(self, FailurePolicy::FailFast)
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            FailurePolicy::FailFast => "fail_fast",
            FailurePolicy::BestEffort => "best_effort",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_fail_fast() {
        assert_eq!(FailurePolicy::default(), FailurePolicy::FailFast);
        assert!(FailurePolicy::FailFast.cancels_siblings());
        assert!(!FailurePolicy::BestEffort.cancels_siblings());
    }
}
