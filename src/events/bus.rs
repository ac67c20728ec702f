//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`] so the engine, dispatcher and
//! subscriber workers can publish without blocking.
//!
//! ```text
//! Publishers (many):                   Consumers:
//!   Engine (enqueue/cancel/evict) ──┐
//!   Dispatcher (transitions)      ──┼──► Bus ──► subscriber listener ──► SubscriberSet
//!   SubscriberSet (overflow/panic)──┘        └──► Bus::subscribe() (tests, custom listeners)
//! ```
//!
//! ## Rules
//! - `publish()` never blocks and never fails; with no receivers the event is dropped.
//! - One ring buffer of `capacity` events is shared by all receivers.
//! - Slow receivers observe `RecvError::Lagged(n)` and skip `n` oldest events.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus; `capacity` is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current receivers (fire-and-forget).
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
