//! # LogWriter: events as structured `tracing` lines
//!
//! Renders every bus event through `tracing`, at `info` for lifecycle
//! progress and `warn` for failures and subscriber trouble.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO autotask: task queued task_id=5f0c.. task_type=bim_analysis priority=high
//! INFO autotask: task started task_id=5f0c.. attempt=1
//! WARN autotask: retry scheduled task_id=5f0c.. attempt=1 delay_ms=100 reason="execution failed: 503"
//! INFO autotask: task completed task_id=5f0c.. attempt=2
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task_id = e.task_id.map(|id| id.to_string()).unwrap_or_default();
        let task_type = e.task_type.as_ref().map(|t| t.as_str()).unwrap_or("");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::TaskQueued => tracing::info!(
                target: "autotask",
                %task_id, task_type, priority = ?e.priority, "task queued"
            ),
            EventKind::TaskStarting => tracing::info!(
                target: "autotask",
                %task_id, task_type, attempt = e.attempt, "task started"
            ),
            EventKind::TaskCompleted => tracing::info!(
                target: "autotask",
                %task_id, task_type, attempt = e.attempt, "task completed"
            ),
            EventKind::TaskRetryScheduled => tracing::warn!(
                target: "autotask",
                %task_id, task_type, attempt = e.attempt, delay_ms = e.delay_ms, reason,
                "retry scheduled"
            ),
            EventKind::TaskFailed => tracing::warn!(
                target: "autotask",
                %task_id, task_type, attempt = e.attempt, reason, "task failed"
            ),
            EventKind::TaskCancelled => {
                tracing::info!(target: "autotask", %task_id, task_type, "task cancelled")
            }
            EventKind::TaskEvicted => {
                tracing::debug!(target: "autotask", %task_id, task_type, "task evicted")
            }
            EventKind::TimeoutHit => tracing::warn!(
                target: "autotask",
                %task_id, attempt = e.attempt, timeout_ms = e.timeout_ms, "attempt timed out"
            ),
            EventKind::ResultDiscarded => tracing::info!(
                target: "autotask",
                %task_id, attempt = e.attempt, reason, "late result discarded"
            ),
            EventKind::TaskRecovered => {
                tracing::info!(target: "autotask", %task_id, task_type, "task recovered")
            }
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => tracing::warn!(
                target: "autotask",
                subscriber = e.source.as_deref().unwrap_or("unknown"),
                reason,
                "{}",
                e.kind.as_str()
            ),
            EventKind::ShutdownRequested => {
                tracing::info!(target: "autotask", "shutdown requested")
            }
            EventKind::AllStoppedWithin => {
                tracing::info!(target: "autotask", "all attempts stopped within grace")
            }
            EventKind::GraceExceeded => tracing::warn!(target: "autotask", "grace exceeded"),
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
