use serde_json::Value;

use super::{ExecutionContext, Priority, TaskType};

/// Everything needed to enqueue a task.
///
/// `max_retries = None` inherits [`Config::max_retries`](crate::Config::max_retries).
///
/// ## Example
/// ```rust
/// use autotask::{ExecutionContext, Priority, TaskRequest, TaskType};
/// use serde_json::json;
///
/// let req = TaskRequest::new(
///     TaskType::ComplianceCheck,
///     json!({"projectId": "p-7", "code": "IBC-2021"}),
///     ExecutionContext::new("user-1", "compliance-agent").with_project("p-7"),
/// )
/// .with_priority(Priority::High)
/// .with_max_retries(1);
///
/// assert_eq!(req.max_retries, Some(1));
/// ```
#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub task_type: TaskType,
    pub payload: Value,
    pub context: ExecutionContext,
    pub priority: Priority,
    pub max_retries: Option<u32>,
}

impl TaskRequest {
    pub fn new(task_type: impl Into<TaskType>, payload: Value, context: ExecutionContext) -> Self {
        Self {
            task_type: task_type.into(),
            payload,
            context,
            priority: Priority::default(),
            max_retries: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}
