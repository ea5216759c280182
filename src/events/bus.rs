//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that provides
//! non-blocking event publishing from multiple sources (engine, runner, task contexts).
//!
//! ## Architecture
//! ```text
//! Publishers (many):                  Receivers:
//!   Engine       ──┐
//!   Runner       ──┼──────► Bus ───────► subscriber_listener ────► SubscriberSet
//!   TaskContext  ──┤  (broadcast chan)     (in TaskExecutor)
//!   Prepare hook ──┘                  └──► TaskExecutor::subscribe() (user receivers)
//! ```
//!
//! Each executor owns one bus. A single listener fans events out to the user-defined
//! subscribers via [`SubscriberSet`](crate::SubscriberSet); callers may also hold raw
//! receivers.
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks; it calls `broadcast::Sender::send`.
//! - **Bounded capacity**: a single ring buffer stores recent events for all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: events are lost if there are no active subscribers at send time.
//!
//! ## Capacity behavior
//! When the channel reaches capacity and new events are sent:
//! - The ring buffer keeps only the most recent `capacity` events.
//! - Receivers that fell behind observe `RecvError::Lagged(n)` on the next `recv()`,
//!   indicating how many events were skipped.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for one executor's events.
///
/// Cloneable; every clone publishes into the same ring buffer. Publishing never
/// blocks and never fails: with no receivers the event is simply dropped.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus holding up to `capacity` (at least 1) undelivered events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
