//! # Executor abstraction.
//!
//! A [`TaskExecutor`] performs the actual work of one task type. The engine
//! hands it an [`Invocation`] per attempt and records whatever it returns.
//!
//! Executors must tolerate being invoked again for the same task: a retry
//! re-runs the attempt and the engine does not deduplicate side effects.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::ExecError;
use crate::tasks::{ExecutionContext, TaskId, TaskType};

/// Input of one execution attempt.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub task_id: TaskId,
    pub task_type: TaskType,
    pub payload: Value,
    pub context: ExecutionContext,
    /// 1-based attempt number (`retry_count + 1`).
    pub attempt: u32,
    /// Fired when the task is cancelled, the attempt times out, or the engine shuts down.
    pub cancel: CancellationToken,
}

/// # Asynchronous, cancelable handler for one task type.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use autotask::{ExecError, Invocation, TaskExecutor};
/// use serde_json::{Value, json};
///
/// struct ClashDetection;
///
/// #[async_trait]
/// impl TaskExecutor for ClashDetection {
///     async fn execute(&self, inv: Invocation) -> Result<Value, ExecError> {
///         let model = inv.payload["modelId"]
///             .as_str()
///             .ok_or_else(|| ExecError::invalid_payload("modelId is required"))?;
///         if inv.cancel.is_cancelled() {
///             return Err(ExecError::Canceled);
///         }
///         Ok(json!({ "modelId": model, "clashes": [] }))
///     }
/// }
/// ```
#[async_trait]
pub trait TaskExecutor: Send + Sync + 'static {
    /// Runs one attempt and returns its result.
    ///
    /// Return a retryable error ([`ExecError::Fail`]) for transient problems and a
    /// permanent one ([`ExecError::Fatal`], [`ExecError::InvalidPayload`]) when
    /// retrying cannot help.
    async fn execute(&self, invocation: Invocation) -> Result<Value, ExecError>;

    /// Human-readable name (for logs).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Shared handle to an executor.
pub type ExecutorRef = Arc<dyn TaskExecutor>;
