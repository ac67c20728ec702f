use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Who a task runs for: the initiating user, an optional owning project,
/// the agent/subsystem acting on their behalf, and free-form metadata.
///
/// Carried unchanged from `enqueue` to every executor attempt and into
/// event-log records and notifications.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub agent: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ExecutionContext {
    pub fn new(user_id: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            project_id: None,
            agent: agent.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
