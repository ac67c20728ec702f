//! Error types used by the engine, executors and collaborators.
//!
//! - [`RuntimeError`]: errors raised by the engine itself (shutdown, journal recovery).
//! - [`ExecError`]: errors raised by a single execution attempt of a task.
//! - [`StoreError`], [`NotifyError`], [`JournalError`]: collaborator failures.
//! - [`WaitError`]: returned by [`Engine::wait`](crate::Engine::wait).
//!
//! The engine-facing enums provide `as_label` for logs/metrics, and
//! [`ExecError::is_retryable`] drives the retry policy of the dispatcher.

use std::time::Duration;
use thiserror::Error;

use crate::tasks::{TaskId, TaskType};

/// # Errors produced by the engine runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some attempts were still in flight.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Tasks whose attempt did not finish in time.
        stuck: Vec<TaskId>,
    },

    /// The journal could not be replayed while building the engine.
    #[error("journal recovery failed: {0}")]
    Journal(#[from] JournalError),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use autotask::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Journal(_) => "runtime_journal",
        }
    }
}

/// # Errors produced by one execution attempt.
///
/// Transient variants (`Fail`, `Timeout`, `Panicked`) are retried while the
/// task has retry budget left. Everything else is permanent and moves the task
/// straight to `failed` without consuming a retry.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// Execution failed but may succeed if retried.
    #[error("execution failed: {reason}")]
    Fail {
        /// The underlying error message.
        reason: String,
    },

    /// Attempt exceeded the configured per-attempt timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// Executor panicked while running the attempt.
    #[error("executor panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// Non-recoverable error reported by the executor.
    #[error("fatal error (no retry): {reason}")]
    Fatal {
        /// The underlying error message.
        reason: String,
    },

    /// Payload could not be interpreted by the executor.
    #[error("invalid payload: {reason}")]
    InvalidPayload {
        /// What was wrong with the payload.
        reason: String,
    },

    /// No executor is registered for the task type.
    #[error("no executor registered for task type '{task_type}'")]
    NoExecutor {
        /// The unresolved task type.
        task_type: TaskType,
    },

    /// Attempt observed cancellation and gave up.
    #[error("execution cancelled")]
    Canceled,
}

impl ExecError {
    /// Shorthand for a retryable [`ExecError::Fail`].
    pub fn fail(reason: impl Into<String>) -> Self {
        ExecError::Fail {
            reason: reason.into(),
        }
    }

    /// Shorthand for a permanent [`ExecError::Fatal`].
    pub fn fatal(reason: impl Into<String>) -> Self {
        ExecError::Fatal {
            reason: reason.into(),
        }
    }

    /// Shorthand for a permanent [`ExecError::InvalidPayload`].
    pub fn invalid_payload(reason: impl Into<String>) -> Self {
        ExecError::InvalidPayload {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use autotask::ExecError;
    /// use std::time::Duration;
    ///
    /// let err = ExecError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "exec_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecError::Fail { .. } => "exec_failed",
            ExecError::Timeout { .. } => "exec_timeout",
            ExecError::Panicked { .. } => "exec_panicked",
            ExecError::Fatal { .. } => "exec_fatal",
            ExecError::InvalidPayload { .. } => "exec_invalid_payload",
            ExecError::NoExecutor { .. } => "exec_no_executor",
            ExecError::Canceled => "exec_canceled",
        }
    }

    /// Indicates whether another attempt could succeed.
    ///
    /// # Example
    /// ```
    /// use autotask::{ExecError, TaskType};
    ///
    /// assert!(ExecError::fail("boom").is_retryable());
    /// assert!(!ExecError::NoExecutor { task_type: TaskType::custom("demo") }.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExecError::Fail { .. } | ExecError::Timeout { .. } | ExecError::Panicked { .. }
        )
    }
}

/// Errors returned by a [`RecordStore`](crate::RecordStore).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StoreError {
    /// No record with the given id exists in the collection.
    #[error("record '{id}' not found in '{collection}'")]
    NotFound { collection: String, id: String },

    /// Record fields were not a JSON object.
    #[error("record must be a JSON object")]
    NotAnObject,

    /// Backend-specific failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Errors returned by a [`Notifier`](crate::Notifier).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Delivery failed.
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Errors returned by a [`Journal`](crate::Journal).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum JournalError {
    #[error("journal io: {0}")]
    Io(#[from] std::io::Error),

    #[error("journal codec: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Errors returned by [`Engine::wait`](crate::Engine::wait).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// Task is unknown (never enqueued or already evicted).
    #[error("task {0} not found")]
    NotFound(TaskId),

    /// Task did not reach a terminal state in time.
    #[error("task {id} still not terminal after {timeout:?}")]
    Timeout { id: TaskId, timeout: Duration },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_errors_are_not_retryable() {
        assert!(!ExecError::fatal("nope").is_retryable());
        assert!(!ExecError::invalid_payload("missing documentId").is_retryable());
        assert!(!ExecError::Canceled.is_retryable());
        assert!(
            !ExecError::NoExecutor {
                task_type: TaskType::BimAnalysis
            }
            .is_retryable()
        );
    }

    #[test]
    fn transient_errors_are_retryable() {
        assert!(ExecError::fail("503").is_retryable());
        assert!(
            ExecError::Timeout {
                timeout: Duration::from_millis(5)
            }
            .is_retryable()
        );
        assert!(
            ExecError::Panicked {
                info: "index out of bounds".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn messages_carry_details() {
        let err = ExecError::NoExecutor {
            task_type: TaskType::custom("demo"),
        };
        assert_eq!(
            err.to_string(),
            "no executor registered for task type 'demo'"
        );
        assert_eq!(err.as_label(), "exec_no_executor");
    }
}
