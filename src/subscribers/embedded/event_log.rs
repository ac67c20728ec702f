//! # EventLogWriter: append-only event log
//!
//! Turns every task state transition into an immutable record in a
//! [`RecordStore`]:
//!
//! ```text
//! {
//!   "content":   "Task bim_analysis started (attempt 1)",
//!   "role":      "system",
//!   "agentType": "bim-agent",
//!   "userId":    "user-9",
//!   "projectId": "tower-a",            // omitted when the task has no project
//!   "metadata": {
//!     "taskId":    "5f0c...",
//!     "taskType":  "bim_analysis",
//!     "event":     "task_started",
//!     "data":      { "attempt": 1 },
//!     "timestamp": "2026-10-16T09:30:00Z"
//!   }
//! }
//! ```
//!
//! Store failures are logged with `tracing::warn!` and otherwise ignored.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::events::{Event, EventKind};
use crate::records::RecordStore;
use crate::subscribers::Subscribe;

/// Default collection receiving event-log records.
pub const EVENT_LOG_COLLECTION: &str = "agent_events";

/// Subscriber persisting task transitions to a record store.
pub struct EventLogWriter {
    store: Arc<dyn RecordStore>,
    collection: String,
}

impl EventLogWriter {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_collection(store, EVENT_LOG_COLLECTION)
    }

    pub fn with_collection(store: Arc<dyn RecordStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    /// Builds the log record for `ev`; `None` for events that are not task transitions.
    pub fn record_for(ev: &Event) -> Option<Value> {
        if !ev.kind.is_transition() {
            return None;
        }
        let task_id = ev.task_id?;
        let task_type = ev.task_type.as_ref()?;
        let ctx = ev.context.as_deref();

        let mut record = Map::new();
        record.insert("content".into(), json!(describe(ev, task_type.as_str())));
        record.insert("role".into(), json!("system"));
        record.insert("agentType".into(), json!(ctx.map(|c| c.agent.as_str())));
        record.insert("userId".into(), json!(ctx.map(|c| c.user_id.as_str())));
        if let Some(project) = ctx.and_then(|c| c.project_id.as_deref()) {
            record.insert("projectId".into(), json!(project));
        }
        record.insert(
            "metadata".into(),
            json!({
                "taskId": task_id.to_string(),
                "taskType": task_type.as_str(),
                "event": ev.kind.as_str(),
                "data": event_data(ev),
                "timestamp": ev.at.to_rfc3339(),
            }),
        );
        Some(Value::Object(record))
    }
}

#[async_trait]
impl Subscribe for EventLogWriter {
    async fn on_event(&self, ev: &Event) {
        let Some(record) = Self::record_for(ev) else {
            return;
        };
        if let Err(e) = self.store.insert(&self.collection, record).await {
            tracing::warn!(
                collection = %self.collection,
                event = ev.kind.as_str(),
                error = %e,
                "failed to append event log record"
            );
        }
    }

    fn name(&self) -> &'static str {
        "EventLogWriter"
    }
}

fn describe(ev: &Event, task_type: &str) -> String {
    let attempt = ev.attempt.unwrap_or(1);
    match ev.kind {
        EventKind::TaskQueued => format!("Task {task_type} queued"),
        EventKind::TaskStarting => format!("Task {task_type} started (attempt {attempt})"),
        EventKind::TaskCompleted => format!("Task {task_type} completed"),
        EventKind::TaskRetryScheduled => {
            format!("Task {task_type} failed on attempt {attempt}, retry scheduled")
        }
        EventKind::TaskFailed => format!("Task {task_type} failed"),
        EventKind::TaskCancelled => format!("Task {task_type} cancelled"),
        EventKind::TaskEvicted => format!("Task {task_type} evicted"),
        EventKind::TaskRecovered => format!("Task {task_type} recovered after restart"),
        other => format!("Task {task_type}: {}", other.as_str()),
    }
}

fn event_data(ev: &Event) -> Value {
    let mut data = Map::new();
    if let Some(priority) = ev.priority.filter(|_| ev.kind == EventKind::TaskQueued) {
        data.insert("priority".into(), json!(priority));
    }
    if let Some(attempt) = ev.attempt {
        data.insert("attempt".into(), json!(attempt));
    }
    if let Some(reason) = ev.reason.as_deref() {
        data.insert("error".into(), json!(reason));
    }
    if let Some(delay) = ev.delay_ms {
        data.insert("delayMs".into(), json!(delay));
    }
    if let Some(result) = ev.data.as_deref() {
        data.insert("result".into(), result.clone());
    }
    Value::Object(data)
}
