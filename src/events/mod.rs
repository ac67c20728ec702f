//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`]: event classification and metadata
//! - [`Bus`]: thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Engine` control operations, the dispatcher, `SubscriberSet`
//!   workers (overflow/panic).
//! - **Consumers**: the engine's subscriber listener (fans out to `SubscriberSet`),
//!   and any receiver obtained from [`Engine::events`](crate::Engine::events).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
