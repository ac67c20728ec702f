//! # Example: Construction-site pipeline
//!
//! A document upload fans out into follow-up work:
//!
//! ```text
//! document_analysis (high) ──► task_creation ──► compliance_check (critical)
//!                                           └──► notification (medium)
//! bim_analysis (low, flaky: fails twice, then succeeds)
//! service_integration (no executor registered → fails fast, no retries)
//! ```
//!
//! Run with:
//! ```text
//! RUST_LOG=autotask=info cargo run --example site_pipeline
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde_json::json;
use tracing_subscriber::EnvFilter;

use autotask::{
    BackoffPolicy, BroadcastNotifier, Config, EVENT_LOG_COLLECTION, Engine, EventLogWriter,
    ExecError, ExecutionContext, ExecutorFn, FileJournal, Invocation, MemoryRecordStore, Priority,
    Subscribe, TaskFilter, TaskRequest, TaskType, WorkflowNotification, WorkflowNotifier,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("autotask=info")),
        )
        .init();

    let records = Arc::new(MemoryRecordStore::new());
    let notifier = Arc::new(BroadcastNotifier::default());
    let mut notifications = notifier.subscribe();
    tokio::spawn(async move {
        while let Ok(n) = notifications.recv().await {
            match n {
                WorkflowNotification::WorkflowStarted { task_type, agent, .. } => {
                    tracing::info!(target: "ui", %task_type, agent, "workflow started")
                }
                WorkflowNotification::WorkflowCompleted { task_type, data, .. } => {
                    tracing::info!(target: "ui", %task_type, %data, "workflow completed")
                }
                WorkflowNotification::WorkflowError { task_type, message, .. } => {
                    tracing::warn!(target: "ui", %task_type, message, "workflow error")
                }
            }
        }
    });

    let mut subs: Vec<Arc<dyn Subscribe>> = vec![
        Arc::new(EventLogWriter::new(records.clone())),
        Arc::new(WorkflowNotifier::new(notifier.clone())),
    ];
    #[cfg(feature = "logging")]
    subs.push(Arc::new(autotask::LogWriter::new()));

    let journal_path = std::env::temp_dir().join("autotask-site-pipeline.jsonl");
    let _ = tokio::fs::remove_file(&journal_path).await;

    let cfg = Config {
        dispatch_delay: Duration::from_millis(50),
        backoff: BackoffPolicy::exponential(Duration::from_millis(100), Duration::from_secs(2)),
        timeout: Duration::from_secs(5),
        grace: Duration::from_secs(3),
        ..Config::default()
    };

    let bim_attempts = Arc::new(AtomicU32::new(0));
    let engine = Engine::builder(cfg)
        .with_subscribers(subs)
        .with_journal(Arc::new(FileJournal::new(&journal_path)))
        .with_executor(
            TaskType::DocumentAnalysis,
            ExecutorFn::arc("ocr", |inv: Invocation| async move {
                let doc = inv.payload["documentId"]
                    .as_str()
                    .ok_or_else(|| ExecError::invalid_payload("documentId is required"))?
                    .to_string();
                tokio::time::sleep(Duration::from_millis(150)).await;
                Ok::<_, ExecError>(json!({ "documentId": doc, "pages": 14, "permits": ["scaffold"] }))
            }),
        )
        .with_executor(
            TaskType::ComplianceCheck,
            ExecutorFn::arc("compliance", |inv: Invocation| async move {
                let code = inv.payload["code"].as_str().unwrap_or("IBC-2021").to_string();
                Ok::<_, ExecError>(json!({ "code": code, "violations": 0 }))
            }),
        )
        .with_executor(
            TaskType::Notification,
            ExecutorFn::arc("notify", |inv: Invocation| async move {
                Ok::<_, ExecError>(json!({ "delivered": inv.payload["to"] }))
            }),
        )
        .with_executor(TaskType::BimAnalysis, {
            let attempts = bim_attempts.clone();
            ExecutorFn::arc("clash-detection", move |inv: Invocation| {
                let attempts = attempts.clone();
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                        return Err(ExecError::fail("model service returned 503"));
                    }
                    Ok(json!({ "modelId": inv.payload["modelId"], "clashes": 3 }))
                }
            })
        })
        .build()
        .await?;

    // Follow-up task creation needs the engine itself, so it is registered at runtime.
    let weak = Arc::downgrade(&engine);
    engine.executors().register(
        TaskType::TaskCreation,
        ExecutorFn::arc("follow-ups", move |inv: Invocation| {
            let weak = weak.clone();
            async move {
                let engine = weak
                    .upgrade()
                    .ok_or_else(|| ExecError::fatal("engine is gone"))?;
                let compliance = engine
                    .enqueue(
                        TaskType::ComplianceCheck,
                        json!({ "code": "IBC-2021", "source": inv.task_id.to_string() }),
                        inv.context.clone(),
                        Priority::Critical,
                    )
                    .await;
                let notice = engine
                    .enqueue(
                        TaskType::Notification,
                        json!({ "to": "site-manager", "subject": "New permit documents" }),
                        inv.context.clone(),
                        Priority::Medium,
                    )
                    .await;
                Ok::<_, ExecError>(json!({ "created": [compliance.to_string(), notice.to_string()] }))
            }
        }),
    );

    let ctx = ExecutionContext::new("user-7", "site-agent")
        .with_project("tower-a")
        .with_metadata("source", "upload");

    let bim = engine
        .enqueue(TaskType::BimAnalysis, json!({ "modelId": "m-12" }), ctx.clone(), Priority::Low)
        .await;
    let doc = engine
        .enqueue(
            TaskType::DocumentAnalysis,
            json!({ "documentId": "doc-881" }),
            ctx.clone(),
            Priority::High,
        )
        .await;
    let follow_ups = engine
        .enqueue(TaskType::TaskCreation, json!({}), ctx.clone(), Priority::High)
        .await;
    let unhandled = engine
        .enqueue_with(
            TaskRequest::new(TaskType::ServiceIntegration, json!({ "service": "weather" }), ctx)
                .with_max_retries(5),
        )
        .await;

    for id in [doc, follow_ups, bim, unhandled] {
        let task = engine.wait(id, Duration::from_secs(30)).await?;
        tracing::info!(
            task_id = %task.id,
            task_type = %task.task_type,
            status = %task.status,
            retries = task.retry_count,
            error = task.error.as_deref().unwrap_or("-"),
            "finished"
        );
    }
    tokio::time::sleep(Duration::from_millis(500)).await;

    for task in engine.list(TaskFilter::all()).await {
        println!(
            "{:<20} {:<9} {:<10} retries={}",
            task.task_type, task.priority.as_str(), task.status, task.retry_count
        );
    }
    println!(
        "event log: {} records in '{}'",
        records.records(EVENT_LOG_COLLECTION).len(),
        EVENT_LOG_COLLECTION
    );

    let evicted = engine.evict(Duration::ZERO).await;
    println!("evicted {evicted} finished tasks");

    engine.shutdown().await?;
    Ok(())
}
