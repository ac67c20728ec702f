//! # Built-in subscribers
//!
//! - [`LogWriter`]: renders events through `tracing` (feature `logging`).
//! - [`EventLogWriter`]: appends the immutable event log to a [`RecordStore`](crate::RecordStore).
//! - [`WorkflowNotifier`]: forwards lifecycle notifications to a [`Notifier`].

mod event_log;
#[cfg(feature = "logging")]
mod log;
mod notifier;

pub use event_log::{EVENT_LOG_COLLECTION, EventLogWriter};
#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use notifier::{BroadcastNotifier, Notifier, WorkflowNotification, WorkflowNotifier};
