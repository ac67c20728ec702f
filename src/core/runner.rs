//! # Run a single execution attempt.
//!
//! - resolve the executor (missing → permanent [`ExecError::NoExecutor`])
//! - apply the per-attempt timeout (fires the attempt token, publishes `TimeoutHit`)
//! - isolate executor panics (`catch_unwind` → retryable [`ExecError::Panicked`])
//!
//! The runner never touches task state; the store applies the outcome.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::ExecError;
use crate::events::{Bus, Event, EventKind};
use crate::executors::{ExecutorRef, Invocation};
use crate::subscribers::panic_message;
use crate::tasks::Task;

/// Executes one attempt of `task` with `executor`.
pub(crate) async fn run_once(
    executor: Option<ExecutorRef>,
    task: &Task,
    cancel: CancellationToken,
    timeout: Option<Duration>,
    bus: &Bus,
) -> Result<Value, ExecError> {
    let Some(executor) = executor else {
        tracing::error!(
            task_id = %task.id,
            task_type = %task.task_type,
            "no executor registered for task type"
        );
        return Err(ExecError::NoExecutor {
            task_type: task.task_type.clone(),
        });
    };

    let attempt = task.attempt();
    let invocation = Invocation {
        task_id: task.id,
        task_type: task.task_type.clone(),
        payload: task.payload.clone(),
        context: task.context.clone(),
        attempt,
        cancel: cancel.clone(),
    };
    let fut = AssertUnwindSafe(executor.execute(invocation)).catch_unwind();

    let res = if let Some(dur) = timeout.filter(|d| !d.is_zero()) {
        match time::timeout(dur, fut).await {
            Ok(r) => r,
            Err(_elapsed) => {
                cancel.cancel();
                bus.publish(
                    Event::for_task(EventKind::TimeoutHit, task)
                        .with_attempt(attempt)
                        .with_timeout(dur),
                );
                return Err(ExecError::Timeout { timeout: dur });
            }
        }
    } else {
        fut.await
    };

    res.unwrap_or_else(|panic| {
        let info = panic_message(panic.as_ref());
        tracing::warn!(task_id = %task.id, executor = executor.name(), %info, "executor panicked");
        Err(ExecError::Panicked { info })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::ExecutorFn;
    use crate::tasks::{ExecutionContext, Priority, TaskType};
    use serde_json::json;

    fn task() -> Task {
        Task::new(
            TaskType::ServiceIntegration,
            json!({"service": "weather"}),
            ExecutionContext::new("user-1", "integration-agent"),
            Priority::Medium,
            3,
        )
    }

    #[tokio::test]
    async fn missing_executor_is_permanent() {
        let err = run_once(None, &task(), CancellationToken::new(), None, &Bus::new(8))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::NoExecutor { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn passes_payload_and_attempt() {
        let exec: ExecutorRef = ExecutorFn::arc("echo", |inv: Invocation| async move {
            Ok::<_, ExecError>(json!({"service": inv.payload["service"], "attempt": inv.attempt}))
        });
        let out = run_once(Some(exec), &task(), CancellationToken::new(), None, &Bus::new(8))
            .await
            .unwrap();
        assert_eq!(out, json!({"service": "weather", "attempt": 1}));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fires_token_and_publishes() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let token = CancellationToken::new();
        let exec: ExecutorRef = ExecutorFn::arc("slow", |_inv: Invocation| async move {
            time::sleep(Duration::from_secs(60)).await;
            Ok::<_, ExecError>(json!(null))
        });

        let err = run_once(
            Some(exec),
            &task(),
            token.clone(),
            Some(Duration::from_millis(50)),
            &bus,
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            ExecError::Timeout {
                timeout: Duration::from_millis(50)
            }
        );
        assert!(token.is_cancelled());
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::TimeoutHit);
        assert_eq!(ev.timeout_ms, Some(50));
    }

    #[tokio::test]
    async fn panic_becomes_retryable_error() {
        let exec: ExecutorRef = ExecutorFn::arc("panicky", |_inv: Invocation| async move {
            if true {
                panic!("model file truncated");
            }
            Ok::<_, ExecError>(json!(null))
        });
        let err = run_once(Some(exec), &task(), CancellationToken::new(), None, &Bus::new(8))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ExecError::Panicked {
                info: "model file truncated".into()
            }
        );
        assert!(err.is_retryable());
    }
}
