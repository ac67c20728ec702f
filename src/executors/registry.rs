//! # Executor registry.
//!
//! Maps each [`TaskType`] to exactly one executor.
//!
//! ## Rules
//! - `register` overwrites any prior registration for the type (last writer wins).
//! - `resolve` returns `None` for unknown types; the dispatcher turns that into
//!   the permanent [`ExecError::NoExecutor`](crate::ExecError::NoExecutor), which
//!   fails the task without consuming retries.
//! - Registration is allowed at any time; an attempt uses whatever is
//!   registered at the moment it is dispatched.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::executors::executor::ExecutorRef;
use crate::tasks::TaskType;

/// Thread-safe type → executor map.
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: RwLock<HashMap<TaskType, ExecutorRef>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `executor` for `task_type`, returning the one it replaced.
    pub fn register(
        &self,
        task_type: impl Into<TaskType>,
        executor: ExecutorRef,
    ) -> Option<ExecutorRef> {
        let task_type = task_type.into();
        tracing::debug!(task_type = %task_type, executor = executor.name(), "executor registered");
        self.executors.write().insert(task_type, executor)
    }

    /// Removes the registration for `task_type`.
    pub fn unregister(&self, task_type: &TaskType) -> Option<ExecutorRef> {
        self.executors.write().remove(task_type)
    }

    /// Returns the executor for `task_type`, if any.
    pub fn resolve(&self, task_type: &TaskType) -> Option<ExecutorRef> {
        self.executors.read().get(task_type).cloned()
    }

    /// Returns the registered task types, sorted by name.
    pub fn types(&self) -> Vec<TaskType> {
        let mut types: Vec<TaskType> = self.executors.read().keys().cloned().collect();
        types.sort_unstable_by(|a, b| a.as_str().cmp(b.as_str()));
        types
    }

    pub fn len(&self) -> usize {
        self.executors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExecError;
    use crate::executors::{ExecutorFn, Invocation};
    use serde_json::json;

    fn named(name: &'static str) -> ExecutorRef {
        ExecutorFn::arc(name, |_inv: Invocation| async {
            Ok::<_, ExecError>(json!(null))
        })
    }

    #[test]
    fn resolve_unknown_type_is_none() {
        let reg = ExecutorRegistry::new();
        assert!(reg.resolve(&TaskType::BimAnalysis).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn last_writer_wins() {
        let reg = ExecutorRegistry::new();
        assert!(reg.register(TaskType::BimAnalysis, named("first")).is_none());
        let replaced = reg.register(TaskType::BimAnalysis, named("second"));
        assert_eq!(replaced.map(|e| e.name().to_string()).as_deref(), Some("first"));
        let current = reg.resolve(&TaskType::BimAnalysis).unwrap();
        assert_eq!(current.name(), "second");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn custom_spelling_of_known_type_resolves_same_entry() {
        let reg = ExecutorRegistry::new();
        reg.register(TaskType::Custom("compliance_check".into()), named("spelled"));
        assert_eq!(reg.resolve(&TaskType::ComplianceCheck).unwrap().name(), "spelled");
        reg.register(TaskType::ComplianceCheck, named("variant"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn types_are_sorted_and_unregister_removes() {
        let reg = ExecutorRegistry::new();
        reg.register("notification", named("n"));
        reg.register(TaskType::ComplianceCheck, named("c"));
        reg.register("demo", named("d"));
        assert_eq!(
            reg.types(),
            vec![
                TaskType::ComplianceCheck,
                TaskType::custom("demo"),
                TaskType::Notification
            ]
        );
        assert!(reg.unregister(&TaskType::custom("demo")).is_some());
        assert!(reg.resolve(&TaskType::custom("demo")).is_none());
    }
}
