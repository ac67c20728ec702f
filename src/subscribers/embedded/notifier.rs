//! # Workflow notifications for external listeners (e.g. a live UI).
//!
//! [`Notifier`] is the notification-sink contract; [`WorkflowNotifier`] is the
//! subscriber that drives it from bus events:
//!
//! ```text
//! TaskStarting  ──► notify_workflow_start(type, id, agent)
//! TaskCompleted ──► notify_workflow_complete(type, id, agent, result)
//! TaskFailed    ──► notify_workflow_error(type, id, agent, message)
//! ```
//!
//! Delivery errors are logged and dropped.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::NotifyError;
use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;
use crate::tasks::{TaskId, TaskType};

/// Notification-sink contract.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify_workflow_start(
        &self,
        task_type: &TaskType,
        task_id: TaskId,
        agent: &str,
    ) -> Result<(), NotifyError>;

    async fn notify_workflow_complete(
        &self,
        task_type: &TaskType,
        task_id: TaskId,
        agent: &str,
        data: &Value,
    ) -> Result<(), NotifyError>;

    async fn notify_workflow_error(
        &self,
        task_type: &TaskType,
        task_id: TaskId,
        agent: &str,
        message: &str,
    ) -> Result<(), NotifyError>;
}

/// Notification published by [`BroadcastNotifier`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowNotification {
    WorkflowStarted {
        task_type: TaskType,
        task_id: TaskId,
        agent: String,
    },
    WorkflowCompleted {
        task_type: TaskType,
        task_id: TaskId,
        agent: String,
        data: Value,
    },
    WorkflowError {
        task_type: TaskType,
        task_id: TaskId,
        agent: String,
        message: String,
    },
}

impl WorkflowNotification {
    pub fn task_id(&self) -> TaskId {
        match self {
            WorkflowNotification::WorkflowStarted { task_id, .. }
            | WorkflowNotification::WorkflowCompleted { task_id, .. }
            | WorkflowNotification::WorkflowError { task_id, .. } => *task_id,
        }
    }
}

/// In-process [`Notifier`] backed by a tokio broadcast channel.
///
/// Publishing with no listeners is not an error; the notification is dropped.
#[derive(Clone, Debug)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<WorkflowNotification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowNotification> {
        self.tx.subscribe()
    }

    fn send(&self, n: WorkflowNotification) -> Result<(), NotifyError> {
        let _ = self.tx.send(n);
        Ok(())
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn notify_workflow_start(
        &self,
        task_type: &TaskType,
        task_id: TaskId,
        agent: &str,
    ) -> Result<(), NotifyError> {
        self.send(WorkflowNotification::WorkflowStarted {
            task_type: task_type.clone(),
            task_id,
            agent: agent.to_string(),
        })
    }

    async fn notify_workflow_complete(
        &self,
        task_type: &TaskType,
        task_id: TaskId,
        agent: &str,
        data: &Value,
    ) -> Result<(), NotifyError> {
        self.send(WorkflowNotification::WorkflowCompleted {
            task_type: task_type.clone(),
            task_id,
            agent: agent.to_string(),
            data: data.clone(),
        })
    }

    async fn notify_workflow_error(
        &self,
        task_type: &TaskType,
        task_id: TaskId,
        agent: &str,
        message: &str,
    ) -> Result<(), NotifyError> {
        self.send(WorkflowNotification::WorkflowError {
            task_type: task_type.clone(),
            task_id,
            agent: agent.to_string(),
            message: message.to_string(),
        })
    }
}

/// Subscriber forwarding lifecycle events to a [`Notifier`].
pub struct WorkflowNotifier {
    notifier: Arc<dyn Notifier>,
}

impl WorkflowNotifier {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl Subscribe for WorkflowNotifier {
    async fn on_event(&self, ev: &Event) {
        let (Some(task_id), Some(task_type)) = (ev.task_id, ev.task_type.as_ref()) else {
            return;
        };
        let agent = ev.agent().unwrap_or_default();

        let res = match ev.kind {
            EventKind::TaskStarting => {
                self.notifier
                    .notify_workflow_start(task_type, task_id, agent)
                    .await
            }
            EventKind::TaskCompleted => {
                let data = ev.data.as_deref().cloned().unwrap_or(Value::Null);
                self.notifier
                    .notify_workflow_complete(task_type, task_id, agent, &data)
                    .await
            }
            EventKind::TaskFailed => {
                let message = ev.reason.as_deref().unwrap_or("unknown error");
                self.notifier
                    .notify_workflow_error(task_type, task_id, agent, message)
                    .await
            }
            _ => return,
        };

        if let Err(e) = res {
            tracing::warn!(%task_id, event = ev.kind.as_str(), error = %e, "notification failed");
        }
    }

    fn name(&self) -> &'static str {
        "WorkflowNotifier"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{ExecutionContext, Priority, Task};
    use serde_json::json;

    fn task() -> Task {
        Task::new(
            TaskType::DocumentAnalysis,
            json!({"documentId": "d-1"}),
            ExecutionContext::new("user-1", "document-agent"),
            Priority::Medium,
            3,
        )
    }

    #[tokio::test]
    async fn maps_lifecycle_events_to_notifications() {
        let sink = BroadcastNotifier::default();
        let mut rx = sink.subscribe();
        let sub = WorkflowNotifier::new(Arc::new(sink));
        let t = task();

        sub.on_event(&Event::for_task(EventKind::TaskQueued, &t)).await;
        sub.on_event(&Event::for_task(EventKind::TaskStarting, &t)).await;
        sub.on_event(&Event::for_task(EventKind::TaskCompleted, &t).with_data(json!({"pages": 3})))
            .await;
        sub.on_event(&Event::for_task(EventKind::TaskFailed, &t).with_reason("ocr down"))
            .await;

        assert_eq!(
            rx.recv().await.unwrap(),
            WorkflowNotification::WorkflowStarted {
                task_type: TaskType::DocumentAnalysis,
                task_id: t.id,
                agent: "document-agent".into(),
            }
        );
        match rx.recv().await.unwrap() {
            WorkflowNotification::WorkflowCompleted { data, .. } => {
                assert_eq!(data, json!({"pages": 3}))
            }
            other => panic!("unexpected {other:?}"),
        }
        match rx.recv().await.unwrap() {
            WorkflowNotification::WorkflowError { message, .. } => assert_eq!(message, "ocr down"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    struct Broken;

    #[async_trait]
    impl Notifier for Broken {
        async fn notify_workflow_start(&self, _: &TaskType, _: TaskId, _: &str) -> Result<(), NotifyError> {
            Err(NotifyError::Delivery("socket closed".into()))
        }
        async fn notify_workflow_complete(&self, _: &TaskType, _: TaskId, _: &str, _: &Value) -> Result<(), NotifyError> {
            Err(NotifyError::Delivery("socket closed".into()))
        }
        async fn notify_workflow_error(&self, _: &TaskType, _: TaskId, _: &str, _: &str) -> Result<(), NotifyError> {
            Err(NotifyError::Delivery("socket closed".into()))
        }
    }

    #[tokio::test]
    async fn delivery_errors_are_swallowed() {
        let sub = WorkflowNotifier::new(Arc::new(Broken));
        sub.on_event(&Event::for_task(EventKind::TaskStarting, &task())).await;
    }

    #[test]
    fn notification_serializes_with_type_tag() {
        let t = task();
        let n = WorkflowNotification::WorkflowError {
            task_type: t.task_type.clone(),
            task_id: t.id,
            agent: "document-agent".into(),
            message: "boom".into(),
        };
        let v = serde_json::to_value(&n).unwrap();
        assert_eq!(v["type"], "workflow_error");
        assert_eq!(v["task_type"], "document_analysis");
        assert_eq!(n.task_id(), t.id);
    }
}
