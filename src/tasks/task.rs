//! # Task record and lifecycle state machine.
//!
//! A [`Task`] is created by [`Engine::enqueue`](crate::Engine::enqueue) and owned by
//! the engine's store; callers only ever see cloned snapshots.
//!
//! ## State machine
//! ```text
//!            ┌──────── requeue (retryable failure, budget left) ───────┐
//!            ▼                                                         │
//!        ┌─────────┐   start    ┌─────────┐  complete   ┌───────────┐  │
//!  ────► │ pending │ ─────────► │ running │ ──────────► │ completed │  │
//!        └────┬────┘            └────┬────┘             └───────────┘  │
//!             │                      ├─────────────────────────────────┘
//!             │ cancel               │ fail (budget exhausted / permanent)
//!             ▼                      ▼
//!       ┌───────────┐ ◄─ cancel ─ ┌────────┐
//!       │ cancelled │             │ failed │
//!       └───────────┘             └────────┘
//! ```
//!
//! ## Rules
//! - Every transition method checks its source state and returns `false`
//!   without touching the task when the transition is illegal.
//! - `retry_count <= max_retries` always.
//! - Terminal states (`completed`, `failed`, `cancelled`) have no exits.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{ExecutionContext, Priority, TaskType};

/// Opaque, never-reused task identifier (UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// True for `completed`, `failed` and `cancelled`.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of autonomous work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub task_type: TaskType,
    pub priority: Priority,
    pub status: TaskStatus,
    pub payload: Value,
    pub context: ExecutionContext,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Arrival order assigned by the store; FIFO tie-break within a priority tier.
    pub seq: u64,
}

impl Task {
    pub(crate) fn new(
        task_type: TaskType,
        payload: Value,
        context: ExecutionContext,
        priority: Priority,
        max_retries: u32,
    ) -> Self {
        Self {
            id: TaskId::new(),
            task_type,
            priority,
            status: TaskStatus::Pending,
            payload,
            context,
            retry_count: 0,
            max_retries,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
            result: None,
            seq: 0,
        }
    }

    /// 1-based number of the current (or next) execution attempt.
    #[inline]
    pub fn attempt(&self) -> u32 {
        self.retry_count + 1
    }

    /// True when another retryable failure would still requeue the task.
    #[inline]
    pub fn has_retry_budget(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Timestamp used for age-based eviction.
    pub fn finished_at(&self) -> DateTime<Utc> {
        self.completed_at.unwrap_or(self.created_at)
    }

    /// `pending → running`.
    pub(crate) fn start(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != TaskStatus::Pending {
            return false;
        }
        self.status = TaskStatus::Running;
        self.started_at = Some(now);
        true
    }

    /// `running → completed`.
    pub(crate) fn complete(&mut self, result: Value, now: DateTime<Utc>) -> bool {
        if self.status != TaskStatus::Running {
            return false;
        }
        self.status = TaskStatus::Completed;
        self.completed_at = Some(now);
        self.result = Some(result);
        true
    }

    /// `running → pending` with `retry_count + 1`; refused once the budget is spent.
    pub(crate) fn requeue(&mut self) -> bool {
        if self.status != TaskStatus::Running || !self.has_retry_budget() {
            return false;
        }
        self.status = TaskStatus::Pending;
        self.retry_count += 1;
        true
    }

    /// `running → failed`.
    pub(crate) fn fail(&mut self, error: String, now: DateTime<Utc>) -> bool {
        if self.status != TaskStatus::Running {
            return false;
        }
        self.status = TaskStatus::Failed;
        self.completed_at = Some(now);
        self.error = Some(error);
        true
    }

    /// `pending | running → cancelled`.
    pub(crate) fn cancel(&mut self, now: DateTime<Utc>) -> bool {
        if !matches!(self.status, TaskStatus::Pending | TaskStatus::Running) {
            return false;
        }
        self.status = TaskStatus::Cancelled;
        self.completed_at = Some(now);
        true
    }

    /// `running → pending` after a crash; the interrupted attempt does not count.
    pub(crate) fn recover(&mut self) -> bool {
        if self.status != TaskStatus::Running {
            return false;
        }
        self.status = TaskStatus::Pending;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(max_retries: u32) -> Task {
        Task::new(
            TaskType::custom("demo"),
            json!({"documentId": "doc-1"}),
            ExecutionContext::new("user-1", "document-agent"),
            Priority::High,
            max_retries,
        )
    }

    #[test]
    fn success_path_sets_result_and_timestamps() {
        let mut t = task(3);
        let now = Utc::now();
        assert!(t.start(now));
        assert!(t.complete(json!({"pages": 4}), now));
        assert_eq!(t.status, TaskStatus::Completed);
        assert_eq!(t.result, Some(json!({"pages": 4})));
        assert_eq!(t.retry_count, 0);
        assert!(t.started_at.is_some() && t.completed_at.is_some());
    }

    #[test]
    fn pending_cannot_skip_running() {
        let mut t = task(3);
        assert!(!t.complete(json!(null), Utc::now()));
        assert!(!t.fail("boom".into(), Utc::now()));
        assert!(!t.requeue());
        assert_eq!(t.status, TaskStatus::Pending);
    }

    #[test]
    fn requeue_respects_budget() {
        let mut t = task(1);
        assert!(t.start(Utc::now()));
        assert!(t.requeue());
        assert_eq!((t.status, t.retry_count), (TaskStatus::Pending, 1));
        assert!(t.start(Utc::now()));
        assert!(!t.requeue());
        assert_eq!(t.retry_count, 1);
        assert!(t.fail("still broken".into(), Utc::now()));
        assert_eq!(t.error.as_deref(), Some("still broken"));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        let mut t = task(0);
        assert!(t.cancel(Utc::now()));
        assert!(!t.cancel(Utc::now()));
        assert!(!t.start(Utc::now()));
        assert!(!t.recover());
        assert_eq!(t.status, TaskStatus::Cancelled);
    }

    #[test]
    fn recover_resets_running_without_consuming_retry() {
        let mut t = task(2);
        assert!(t.start(Utc::now()));
        assert!(t.recover());
        assert_eq!((t.status, t.retry_count), (TaskStatus::Pending, 0));
    }

    #[test]
    fn serde_round_trips_snapshot() {
        let t = task(2);
        let encoded = serde_json::to_value(&t).unwrap();
        assert_eq!(encoded["status"], "pending");
        assert_eq!(encoded["task_type"], "demo");
        let back: Task = serde_json::from_value(encoded).unwrap();
        assert_eq!(back.id, t.id);
        assert_eq!(back.max_retries, 2);
    }
}
