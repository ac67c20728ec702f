//! # Engine: the public control surface.
//!
//! The [`Engine`] owns the task store, the executor registry, the event bus and
//! the single dispatcher loop. It is built once by [`EngineBuilder`](crate::EngineBuilder)
//! and shared as `Arc<Engine>`.
//!
//! ## Architecture
//! ```text
//! callers ── enqueue/cancel/evict ──► TaskStore ◄── claim/finish ── Dispatcher ──► TaskExecutor
//!                                        │  (journal writes under the same lock)
//!                                        └──► Bus ──► listener ──► SubscriberSet
//!                                                                   ├─► EventLogWriter
//!                                                                   ├─► WorkflowNotifier
//!                                                                   └─► LogWriter
//! ```
//!
//! ## Shutdown path
//! ```text
//! shutdown()
//!   └─► Bus.publish(ShutdownRequested)
//!   └─► runtime_token.cancel()   → dispatcher stops selecting, attempt tokens fire
//!   └─► wait for the dispatcher to drain, up to cfg.grace:
//!          ├─ drained in time → Bus.publish(AllStoppedWithin)
//!          └─ grace exceeded  → Bus.publish(GraceExceeded), RuntimeError::GraceExceeded
//! ```
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use autotask::{Config, Engine, ExecError, ExecutionContext, ExecutorFn, Invocation, Priority, TaskStatus, TaskType};
//! use serde_json::json;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::builder(Config::default())
//!         .with_executor(
//!             TaskType::Notification,
//!             ExecutorFn::arc("notify", |inv: Invocation| async move {
//!                 Ok::<_, ExecError>(json!({ "sent": inv.payload["to"] }))
//!             }),
//!         )
//!         .build()
//!         .await?;
//!
//!     let id = engine
//!         .enqueue(
//!             TaskType::Notification,
//!             json!({ "to": "site-manager" }),
//!             ExecutionContext::new("user-1", "notification-agent"),
//!             Priority::High,
//!         )
//!         .await;
//!
//!     let task = engine.wait(id, Duration::from_secs(5)).await?;
//!     assert_eq!(task.status, TaskStatus::Completed);
//!
//!     engine.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::{EngineBuilder, config::Config, shutdown, store::TaskStore};
use crate::error::{RuntimeError, WaitError};
use crate::events::{Bus, Event, EventKind};
use crate::executors::ExecutorRegistry;
use crate::tasks::{ExecutionContext, Priority, Task, TaskFilter, TaskId, TaskRequest, TaskType};

/// Autonomous task execution engine.
pub struct Engine {
    pub(crate) cfg: Config,
    pub(crate) bus: Bus,
    pub(crate) store: Arc<TaskStore>,
    pub(crate) executors: Arc<ExecutorRegistry>,
    pub(crate) subscriber_count: usize,
    pub(crate) runtime_token: CancellationToken,
    /// Stops the subscriber listener after the final shutdown event.
    pub(crate) listener_token: CancellationToken,
    pub(crate) dispatcher: Mutex<Option<JoinHandle<()>>>,
    pub(crate) listener: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Starts building an engine with the given configuration.
    pub fn builder(cfg: Config) -> EngineBuilder {
        EngineBuilder::new(cfg)
    }

    /// Enqueues a task with the configured default retry budget.
    ///
    /// Always succeeds; the task is `pending` when this returns and the
    /// dispatcher has been woken.
    pub async fn enqueue(
        &self,
        task_type: impl Into<TaskType>,
        payload: Value,
        context: ExecutionContext,
        priority: Priority,
    ) -> TaskId {
        self.enqueue_with(TaskRequest::new(task_type, payload, context).with_priority(priority))
            .await
    }

    /// Enqueues a fully specified request.
    pub async fn enqueue_with(&self, req: TaskRequest) -> TaskId {
        let task = Task::new(
            req.task_type,
            req.payload,
            req.context,
            req.priority,
            req.max_retries.unwrap_or(self.cfg.max_retries),
        );
        self.store.insert(task).await
    }

    /// Snapshot of the task, or `None` if unknown or evicted.
    pub async fn status(&self, id: TaskId) -> Option<Task> {
        self.store.get(id).await
    }

    /// Cancels a `pending` or `running` task.
    ///
    /// Returns `false` for unknown and already terminal tasks. A running
    /// attempt gets its cancellation token fired; whatever it returns later is
    /// discarded.
    pub async fn cancel(&self, id: TaskId) -> bool {
        self.store.cancel(id).await
    }

    /// Tasks matching `filter`, newest first.
    pub async fn list(&self, filter: TaskFilter) -> Vec<Task> {
        self.store.list(&filter).await
    }

    /// Removes terminal tasks that finished at least `older_than` ago.
    ///
    /// Pending and running tasks are never evicted. Returns the number removed.
    pub async fn evict(&self, older_than: Duration) -> usize {
        self.store.evict(older_than).await
    }

    /// Waits until the task reaches a terminal state.
    pub async fn wait(&self, id: TaskId, timeout: Duration) -> Result<Task, WaitError> {
        self.store.wait(id, timeout).await
    }

    /// Executor registry; registration is allowed at any time.
    pub fn executors(&self) -> &Arc<ExecutorRegistry> {
        &self.executors
    }

    /// Receiver of all events published after this call.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Configuration the engine was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count
    }

    /// Stops the dispatcher and waits up to `Config::grace` for in-flight attempts.
    ///
    /// Attempts interrupted by the shutdown are put back to `pending` (and
    /// journaled) so they run again after a restart. Calling it again is a no-op.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let Some(handle) = self.dispatcher.lock().take() else {
            return Ok(());
        };
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.runtime_token.cancel();

        let grace = self.cfg.grace;
        let res = match tokio::time::timeout(grace, handle).await {
            Ok(_) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                let stuck = self.store.running_ids().await;
                self.bus.publish(
                    Event::new(EventKind::GraceExceeded)
                        .with_reason(format!("{} attempt(s) still running", stuck.len())),
                );
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        };
        self.drain_subscribers(grace).await;
        res
    }

    /// Delivers events already on the bus and waits for subscriber queues to empty.
    async fn drain_subscribers(&self, grace: Duration) {
        self.listener_token.cancel();
        let Some(listener) = self.listener.lock().take() else {
            return;
        };
        if tokio::time::timeout(grace, listener).await.is_err() {
            tracing::warn!(?grace, "subscribers did not drain within grace");
        }
    }

    /// Runs until SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere), then shuts down.
    pub async fn run_until_signal(&self) -> Result<(), RuntimeError> {
        if let Err(e) = shutdown::wait_for_shutdown_signal().await {
            tracing::warn!(error = %e, "signal handlers unavailable; shutting down");
        }
        self.shutdown().await
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.runtime_token.cancel();
        self.listener_token.cancel();
    }
}
