//! Execution policies.
//!
//! ## Contents
//! - [`FailurePolicy`] how failures of independent roots are rolled up (fail-fast / best-effort)
//!
//! ## Quick wiring
//! ```text
//! ExecutorBuilder { policy: FailurePolicy }
//!      └─► core::engine uses:
//!           - cancels_siblings() when a root fails
//!           - the policy again when summarizing the executor outcome
//! ```

mod failure;

pub use failure::FailurePolicy;
