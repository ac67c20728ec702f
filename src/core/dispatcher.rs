//! # Dispatcher: the single selection loop.
//!
//! ```text
//! loop:
//!   acquire worker slot ──► claim_next() ── Ready ──► spawn attempt ──► finish()
//!         ▲                     │                          │
//!         │                     └─ Idle ─► wait(wake | next backoff deadline | shutdown)
//!         └──────────── dispatch_delay, then slot released ─┘
//! ```
//!
//! ## Rules
//! - A slot is acquired **before** selection, so every pick sees the full
//!   pending set and priority order holds for any number of workers.
//! - Task failures never leave the loop; only the runtime token stops it.
//! - After the token fires, in-flight attempts are drained before `run` returns.
//!   Attempts that end in an error because of shutdown go back to `pending`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::core::runner::run_once;
use crate::core::store::{Claim, Next, TaskStore};
use crate::events::Bus;
use crate::executors::ExecutorRegistry;
use crate::policies::RetryPolicy;

pub(crate) struct Dispatcher {
    pub(crate) store: Arc<TaskStore>,
    pub(crate) executors: Arc<ExecutorRegistry>,
    pub(crate) bus: Bus,
    pub(crate) retry: RetryPolicy,
    pub(crate) timeout: Option<Duration>,
    pub(crate) dispatch_delay: Duration,
    pub(crate) slots: Arc<Semaphore>,
}

impl Dispatcher {
    pub(crate) async fn run(self, token: CancellationToken) {
        let this = Arc::new(self);
        let mut inflight = JoinSet::new();

        loop {
            let permit = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                p = Arc::clone(&this.slots).acquire_owned() => match p {
                    Ok(p) => p,
                    Err(_closed) => break,
                },
            };
            let Some(claim) = this.next_claim(&token).await else {
                break;
            };

            let me = Arc::clone(&this);
            let shutdown = token.clone();
            inflight.spawn(async move {
                me.execute(claim, &shutdown).await;
                tokio::select! {
                    _ = time::sleep(me.dispatch_delay) => {}
                    _ = shutdown.cancelled() => {}
                }
                drop(permit);
            });
            while inflight.try_join_next().is_some() {}
        }

        tracing::debug!(inflight = inflight.len(), "dispatcher stopping");
        while inflight.join_next().await.is_some() {}
    }

    /// Waits until a task can be claimed; `None` once the runtime is shutting down.
    async fn next_claim(&self, token: &CancellationToken) -> Option<Claim> {
        loop {
            if token.is_cancelled() {
                return None;
            }
            match self.store.claim_next(token).await {
                Next::Ready(claim) => return Some(claim),
                Next::Idle(deadline) => {
                    tokio::select! {
                        _ = token.cancelled() => return None,
                        _ = self.store.woken() => {}
                        _ = sleep_until(deadline) => {}
                    }
                }
            }
        }
    }

    async fn execute(&self, claim: Claim, shutdown: &CancellationToken) {
        let Claim { task, cancel } = claim;
        let executor = self.executors.resolve(&task.task_type);
        let outcome = run_once(executor, &task, cancel, self.timeout, &self.bus).await;

        if outcome.is_err() && shutdown.is_cancelled() {
            self.store.interrupt(task.id).await;
        } else {
            self.store.finish(task.id, outcome, &self.retry).await;
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
