//! # Retry decision after a failed attempt.
//!
//! [`RetryPolicy`] turns an attempt failure into a [`RetryDecision`]:
//!
//! ```text
//! error.is_retryable() && retry_count < max_retries  → Requeue { retry, delay }
//! otherwise                                          → Fail
//! ```
//!
//! Permanent errors (missing executor, invalid payload, fatal) never consume
//! retry budget; transient ones do until the budget is spent.

use std::time::Duration;

use crate::error::ExecError;
use crate::policies::BackoffPolicy;
use crate::tasks::Task;

/// Outcome of applying the retry policy to a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Put the task back to `pending`, eligible again after `delay`.
    Requeue {
        /// Retry number the task is about to get (`retry_count + 1`).
        retry: u32,
        delay: Duration,
    },
    /// Move the task to `failed`.
    Fail,
}

/// Bounded retry with backoff.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RetryPolicy {
    pub backoff: BackoffPolicy,
}

impl RetryPolicy {
    pub fn new(backoff: BackoffPolicy) -> Self {
        Self { backoff }
    }

    pub fn decide(&self, task: &Task, err: &ExecError) -> RetryDecision {
        if !err.is_retryable() || !task.has_retry_budget() {
            return RetryDecision::Fail;
        }
        let retry = task.retry_count + 1;
        RetryDecision::Requeue {
            retry,
            delay: self.backoff.delay_for(retry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{ExecutionContext, Priority, TaskType};
    use serde_json::json;

    fn task(retry_count: u32, max_retries: u32) -> Task {
        let mut t = Task::new(
            TaskType::DocumentAnalysis,
            json!({}),
            ExecutionContext::new("u", "document-agent"),
            Priority::Medium,
            max_retries,
        );
        t.retry_count = retry_count;
        t
    }

    #[test]
    fn transient_error_with_budget_requeues() {
        let policy = RetryPolicy::new(BackoffPolicy::default());
        assert_eq!(
            policy.decide(&task(0, 3), &ExecError::fail("503")),
            RetryDecision::Requeue {
                retry: 1,
                delay: Duration::from_millis(100)
            }
        );
    }

    #[test]
    fn exhausted_budget_fails() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.decide(&task(3, 3), &ExecError::fail("503")),
            RetryDecision::Fail
        );
        assert_eq!(
            policy.decide(&task(0, 0), &ExecError::fail("503")),
            RetryDecision::Fail
        );
    }

    #[test]
    fn permanent_error_fails_immediately() {
        let policy = RetryPolicy::default();
        let err = ExecError::NoExecutor {
            task_type: TaskType::DocumentAnalysis,
        };
        assert_eq!(policy.decide(&task(0, 3), &err), RetryDecision::Fail);
        assert_eq!(
            policy.decide(&task(0, 3), &ExecError::invalid_payload("no file")),
            RetryDecision::Fail
        );
    }
}
