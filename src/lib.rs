//! # autotask
//!
//! **autotask** is an autonomous task execution engine.
//!
//! It accepts heterogeneous units of work (document analysis, BIM analysis,
//! compliance checks, notifications, follow-up task creation), queues them by
//! priority, dispatches them to pluggable executors, retries transient failures
//! with a bounded budget and reports every lifecycle transition to subscribers.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   enqueue / cancel / status / list / evict / wait
//!            │
//!            ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Engine (control surface)                                         │
//! │  - TaskStore (tasks + ready queue + attempt tokens, one mutex)    │
//! │  - ExecutorRegistry (task type → executor, last writer wins)      │
//! │  - Journal (optional; snapshots + tombstones, replayed on build)  │
//! └──────┬─────────────────────────────────────────────────────┬──────┘
//!        ▼                                                     │
//! ┌──────────────────────────────┐                             │
//! │  Dispatcher (single loop)    │                             │
//! │  - worker slots (semaphore)  │                             │
//! │  - priority + FIFO selection │                             │
//! │  - retry policy + backoff    │                             │
//! └──────┬───────────────────────┘                             │
//!        ▼                                                     │
//!  run_once ──► TaskExecutor::execute(Invocation)              │
//!        │                                                     │
//!        ▼  transitions publish Events                         ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                            (per-sub queues)
//!                  ┌────────────────┼────────────────┐
//!                  ▼                ▼                ▼
//!            EventLogWriter   WorkflowNotifier    LogWriter
//!            (RecordStore)       (Notifier)       (tracing)
//! ```
//!
//! ### Lifecycle
//! ```text
//! enqueue ──► pending ──► running ──► completed
//!               ▲            │
//!               │            ├─ retryable error, budget left ─► TaskRetryScheduled, back to pending
//!               │            ├─ permanent error / budget spent ─► failed
//!               │            └─ cancel ─► cancelled (late result discarded)
//!               └─ restart recovery (running → pending)
//! ```
//!
//! ## Features
//! | Area              | Description                                               | Key types / traits                          |
//! |-------------------|-----------------------------------------------------------|---------------------------------------------|
//! | **Engine**        | Enqueue, cancel, inspect, evict and await tasks.          | [`Engine`], [`EngineBuilder`]               |
//! | **Executors**     | Pluggable handlers per task type.                         | [`TaskExecutor`], [`ExecutorFn`]            |
//! | **Policies**      | Bounded retry with backoff and jitter.                    | [`RetryPolicy`], [`BackoffPolicy`]          |
//! | **Subscribers**   | Event log, workflow notifications, custom hooks.          | [`Subscribe`], [`EventLogWriter`]           |
//! | **Durability**    | Journal of task snapshots with crash recovery.            | [`Journal`], [`FileJournal`]                |
//! | **Errors**        | Typed errors with retryability classification.            | [`ExecError`], [`RuntimeError`]             |
//! | **Configuration** | Centralized runtime settings.                             | [`Config`]                                  |
//!
//! ## Optional features
//! - `logging` (default): exports [`LogWriter`], rendering events through `tracing`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use autotask::{
//!     Config, Engine, EventLogWriter, ExecError, ExecutionContext, ExecutorFn, Invocation,
//!     MemoryRecordStore, Priority, Subscribe, TaskStatus, TaskType,
//! };
//! use serde_json::json;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let records = Arc::new(MemoryRecordStore::new());
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(EventLogWriter::new(records.clone()))];
//!
//!     let engine = Engine::builder(Config::default())
//!         .with_subscribers(subs)
//!         .with_executor(
//!             TaskType::DocumentAnalysis,
//!             ExecutorFn::arc("ocr", |inv: Invocation| async move {
//!                 let doc = inv.payload["documentId"]
//!                     .as_str()
//!                     .ok_or_else(|| ExecError::invalid_payload("documentId is required"))?
//!                     .to_string();
//!                 Ok::<_, ExecError>(json!({ "documentId": doc, "pages": 3 }))
//!             }),
//!         )
//!         .build()
//!         .await?;
//!
//!     let id = engine
//!         .enqueue(
//!             TaskType::DocumentAnalysis,
//!             json!({ "documentId": "doc-1" }),
//!             ExecutionContext::new("user-1", "document-agent"),
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
mod core;
mod error;
mod events;
mod executors;
mod journal;
mod policies;
mod records;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use crate::core::{Config, Engine, EngineBuilder};
pub use error::{ExecError, JournalError, NotifyError, RuntimeError, StoreError, WaitError};
pub use events::{Bus, Event, EventKind};
pub use executors::{ExecutorFn, ExecutorRef, ExecutorRegistry, Invocation, TaskExecutor};
pub use journal::{FileJournal, Journal, MemoryJournal};
pub use policies::{BackoffPolicy, JitterPolicy, RetryDecision, RetryPolicy};
pub use records::{MemoryRecordStore, RecordStore};
pub use subscribers::{
    BroadcastNotifier, EVENT_LOG_COLLECTION, EventLogWriter, Notifier, Subscribe, SubscriberSet,
    WorkflowNotification, WorkflowNotifier,
};
pub use tasks::{
    ExecutionContext, Priority, Task, TaskFilter, TaskId, TaskRequest, TaskStatus, TaskType,
};

// Built-in tracing subscriber.
// Disable with: `--no-default-features`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
