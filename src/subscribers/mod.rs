//! # Event subscribers.
//!
//! Everything observable about the engine flows through the [`Bus`](crate::Bus);
//! subscribers turn those events into side effects without ever touching task
//! state.
//!
//! ```text
//! Dispatcher ── publish(Event) ──► Bus ──► SubscriberSet
//!                                              ├──► EventLogWriter   (immutable event log)
//!                                              ├──► WorkflowNotifier (UI notifications)
//!                                              ├──► LogWriter        (tracing)
//!                                              └──► custom ...
//! ```

mod embedded;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use embedded::{
    BroadcastNotifier, EVENT_LOG_COLLECTION, EventLogWriter, Notifier, WorkflowNotification,
    WorkflowNotifier,
};
pub(crate) use set::panic_message;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
