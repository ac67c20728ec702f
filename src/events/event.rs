//! # Runtime events emitted by the engine.
//!
//! [`EventKind`] classifies events in three groups:
//! - **Task lifecycle**: one event per state transition of a task
//!   (queued, starting, completed, retry scheduled, failed, cancelled, evicted)
//!   plus attempt-level details (timeout hit, late result discarded, recovered).
//! - **Subscriber health**: overflow and panic of a subscriber worker.
//! - **Shutdown**: requested, all stopped, grace exceeded.
//!
//! [`Event`] carries the task metadata subscribers need to build log records and
//! notifications without reading the store back.
//!
//! ## Ordering guarantees
//! Each event has a globally unique, monotonically increasing `seq`.
//! Events of one task are published in transition order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use autotask::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskRetryScheduled)
//!     .with_reason("upstream 503")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_millis(250));
//!
//! assert_eq!(ev.kind, EventKind::TaskRetryScheduled);
//! assert_eq!(ev.delay_ms, Some(250));
//! assert_eq!(ev.kind.as_str(), "task_retry_scheduled");
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::tasks::{ExecutionContext, Priority, Task, TaskId, TaskType};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Task lifecycle ===
    /// Task created in `pending`.
    ///
    /// Sets: task fields, `at`, `seq`.
    TaskQueued,

    /// Task moved `pending → running`.
    ///
    /// Sets: task fields, `attempt`.
    TaskStarting,

    /// Task moved `running → completed`.
    ///
    /// Sets: task fields, `attempt`, `data` (executor result).
    TaskCompleted,

    /// Attempt failed and the task moved `running → pending`.
    ///
    /// Sets: task fields, `attempt` (the failed one), `reason`, `delay_ms`.
    TaskRetryScheduled,

    /// Task moved `running → failed` (budget exhausted or permanent error).
    ///
    /// Sets: task fields, `attempt`, `reason`.
    TaskFailed,

    /// Task moved `pending | running → cancelled`.
    ///
    /// Sets: task fields.
    TaskCancelled,

    /// Terminal task removed by eviction.
    ///
    /// Sets: task fields.
    TaskEvicted,

    /// Attempt exceeded the per-attempt timeout (always followed by a
    /// `TaskRetryScheduled` or `TaskFailed`).
    ///
    /// Sets: task fields, `attempt`, `timeout_ms`.
    TimeoutHit,

    /// Attempt finished after its task was cancelled; outcome ignored.
    ///
    /// Sets: task fields, `attempt`, `reason` (`"completed"` or the error).
    ResultDiscarded,

    /// Task found `running` in the journal at startup and reset to `pending`.
    ///
    /// Sets: task fields.
    TaskRecovered,

    // === Subscriber health ===
    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `source` (subscriber name), `reason`.
    SubscriberOverflow,

    /// Subscriber panicked while handling an event.
    ///
    /// Sets: `source` (subscriber name), `reason` (panic message).
    SubscriberPanicked,

    // === Shutdown ===
    /// Shutdown requested (explicit call or OS signal).
    ShutdownRequested,

    /// All in-flight attempts stopped within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some attempts were still running.
    GraceExceeded,
}

impl EventKind {
    /// Stable snake_case name (used as the `event` field of log records).
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TaskQueued => "task_queued",
            EventKind::TaskStarting => "task_started",
            EventKind::TaskCompleted => "task_completed",
            EventKind::TaskRetryScheduled => "task_retry_scheduled",
            EventKind::TaskFailed => "task_failed",
            EventKind::TaskCancelled => "task_cancelled",
            EventKind::TaskEvicted => "task_evicted",
            EventKind::TimeoutHit => "timeout_hit",
            EventKind::ResultDiscarded => "result_discarded",
            EventKind::TaskRecovered => "task_recovered",
            EventKind::SubscriberOverflow => "subscriber_overflow",
            EventKind::SubscriberPanicked => "subscriber_panicked",
            EventKind::ShutdownRequested => "shutdown_requested",
            EventKind::AllStoppedWithin => "all_stopped_within_grace",
            EventKind::GraceExceeded => "grace_exceeded",
        }
    }

    /// True for events describing a task state transition.
    pub fn is_transition(&self) -> bool {
        matches!(
            self,
            EventKind::TaskQueued
                | EventKind::TaskStarting
                | EventKind::TaskCompleted
                | EventKind::TaskRetryScheduled
                | EventKind::TaskFailed
                | EventKind::TaskCancelled
                | EventKind::TaskEvicted
                | EventKind::TaskRecovered
        )
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: DateTime<Utc>,
    /// Event classification.
    pub kind: EventKind,

    pub task_id: Option<TaskId>,
    pub task_type: Option<TaskType>,
    pub priority: Option<Priority>,
    /// Initiating user, project and agent of the task.
    pub context: Option<Arc<ExecutionContext>>,
    /// Attempt number (1-based).
    pub attempt: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Structured data (executor result for `TaskCompleted`).
    pub data: Option<Arc<Value>>,
    /// Backoff delay before the next attempt in milliseconds.
    pub delay_ms: Option<u32>,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: Option<u32>,
    /// Emitting component for non-task events (e.g. subscriber name).
    pub source: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: Utc::now(),
            kind,
            task_id: None,
            task_type: None,
            priority: None,
            context: None,
            attempt: None,
            reason: None,
            data: None,
            delay_ms: None,
            timeout_ms: None,
            source: None,
        }
    }

    /// Creates an event describing `task`.
    pub fn for_task(kind: EventKind, task: &Task) -> Self {
        let mut ev = Self::new(kind);
        ev.task_id = Some(task.id);
        ev.task_type = Some(task.task_type.clone());
        ev.priority = Some(task.priority);
        ev.context = Some(Arc::new(task.context.clone()));
        ev
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an attempt number.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches structured data.
    #[inline]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(Arc::new(data));
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(clamp_ms(d));
        self
    }

    /// Attaches a timeout (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(clamp_ms(d));
        self
    }

    /// Attaches the emitting component.
    #[inline]
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Agent of the task, if any.
    pub fn agent(&self) -> Option<&str> {
        self.context.as_deref().map(|c| c.agent.as_str())
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_source(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_source(subscriber)
            .with_reason(info)
    }
}

fn clamp_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn seq_is_monotonic() {
        let a = Event::new(EventKind::TaskQueued);
        let b = Event::new(EventKind::TaskQueued);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn for_task_copies_task_metadata() {
        let task = Task::new(
            TaskType::BimAnalysis,
            json!({"modelId": "m-1"}),
            ExecutionContext::new("user-9", "bim-agent").with_project("tower-a"),
            Priority::Critical,
            3,
        );
        let ev = Event::for_task(EventKind::TaskStarting, &task).with_attempt(task.attempt());
        assert_eq!(ev.task_id, Some(task.id));
        assert_eq!(ev.task_type, Some(TaskType::BimAnalysis));
        assert_eq!(ev.priority, Some(Priority::Critical));
        assert_eq!(ev.agent(), Some("bim-agent"));
        assert_eq!(ev.attempt, Some(1));
    }

    #[test]
    fn durations_saturate() {
        let ev = Event::new(EventKind::TimeoutHit).with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }
}
