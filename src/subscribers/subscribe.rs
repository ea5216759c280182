//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for observing an executor: progress bars,
//! status lines, audit logs. Each subscriber is driven by a dedicated worker loop
//! fed by a bounded queue owned by the [`SubscriberSet`](crate::subscribers::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow; they never block task bodies, the engine or other
//!   subscribers.
//! - Each subscriber declares its queue capacity via [`Subscribe::queue_capacity`].
//!   On overflow its events are dropped and a `SubscriberOverflow` event is published.
//! - A subscriber that wants to touch UI state should hop onto the `ui` scheduler
//!   itself; workers run on the `io` runtime.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use taskgraph::{Event, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct CheckedMods(AtomicU64);
//!
//! #[async_trait::async_trait]
//! impl Subscribe for CheckedMods {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::CounterIncremented {
//!             self.0.store(ev.count.unwrap_or_default(), Ordering::Relaxed);
//!         }
//!     }
//!     fn name(&self) -> &'static str { "checked-mods" }
//!     fn queue_capacity(&self) -> usize { 256 }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
///
/// Called from a subscriber-dedicated worker task. Implementations should avoid
/// blocking the async runtime.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow and panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's queue (minimum 1).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
