//! # Task store: the single owner of task state.
//!
//! One `tokio::sync::Mutex` guards the task map, the ready queue and the
//! cancellation tokens of running attempts. Every transition happens under
//! that lock, and within the same critical section the new snapshot is written
//! to the journal and the matching event is published. Events of one task are
//! therefore observed in transition order.
//!
//! ```text
//! insert ──► pending ──claim_next──► running ──finish──► completed | failed
//!               ▲                       │
//!               └──── requeue (retry) ──┘
//! cancel: pending | running ──► cancelled      (running attempt's token fired)
//! evict:  terminal + old enough ──► removed     (journal tombstone)
//! ```
//!
//! Two notifiers leave the store: `wake` (one permit, consumed by the
//! dispatcher) and `changed` (broadcast to every `wait` caller).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::queue::{QueueItem, ReadyQueue};
use crate::error::{ExecError, WaitError};
use crate::events::{Bus, Event, EventKind};
use crate::journal::Journal;
use crate::policies::{RetryDecision, RetryPolicy};
use crate::tasks::{Task, TaskFilter, TaskId, TaskStatus};

/// A task handed to the dispatcher for one attempt.
pub(crate) struct Claim {
    pub(crate) task: Task,
    pub(crate) cancel: CancellationToken,
}

pub(crate) enum Next {
    Ready(Claim),
    /// Nothing eligible; a delayed retry becomes eligible at the given instant.
    Idle(Option<Instant>),
}

#[derive(Default)]
struct Inner {
    tasks: HashMap<TaskId, Task>,
    queue: ReadyQueue,
    attempts: HashMap<TaskId, CancellationToken>,
    next_seq: u64,
}

pub(crate) struct TaskStore {
    inner: Mutex<Inner>,
    journal: Option<Arc<dyn Journal>>,
    bus: Bus,
    wake: Notify,
    changed: Notify,
}

impl TaskStore {
    pub(crate) fn new(bus: Bus, journal: Option<Arc<dyn Journal>>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            journal,
            bus,
            wake: Notify::new(),
            changed: Notify::new(),
        }
    }

    async fn persist(&self, task: &Task) {
        let Some(journal) = &self.journal else {
            return;
        };
        if let Err(e) = journal.save(task).await {
            tracing::warn!(task_id = %task.id, status = %task.status, error = %e, "journal write failed");
        }
    }

    async fn forget(&self, id: TaskId) {
        let Some(journal) = &self.journal else {
            return;
        };
        if let Err(e) = journal.remove(id).await {
            tracing::warn!(task_id = %id, error = %e, "journal removal failed");
        }
    }

    /// Resolves once the dispatcher has been woken (at most one stored wakeup).
    pub(crate) async fn woken(&self) {
        self.wake.notified().await;
    }

    /// Stores a new task as `pending` and assigns its arrival sequence.
    pub(crate) async fn insert(&self, mut task: Task) -> TaskId {
        let id = task.id;
        {
            let mut inner = self.inner.lock().await;
            task.seq = inner.next_seq;
            inner.next_seq += 1;
            inner.queue.push(QueueItem::from(&task));
            self.persist(&task).await;
            self.bus
                .publish(Event::for_task(EventKind::TaskQueued, &task));
            inner.tasks.insert(id, task);
        }
        self.wake.notify_one();
        id
    }

    /// Loads journaled tasks; interrupted `running` tasks go back to `pending`.
    ///
    /// Returns the number of tasks requeued by the recovery.
    pub(crate) async fn restore(&self, tasks: Vec<Task>) -> usize {
        let mut recovered = 0;
        {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;
            for mut task in tasks {
                inner.next_seq = inner.next_seq.max(task.seq + 1);
                if task.recover() {
                    recovered += 1;
                    self.persist(&task).await;
                    self.bus.publish(
                        Event::for_task(EventKind::TaskRecovered, &task)
                            .with_attempt(task.attempt())
                            .with_reason("interrupted by restart"),
                    );
                }
                if task.status == TaskStatus::Pending {
                    inner.queue.push(QueueItem::from(&task));
                }
                inner.tasks.insert(task.id, task);
            }
        }
        self.wake.notify_one();
        recovered
    }

    /// Claims the best eligible pending task and marks it `running`.
    pub(crate) async fn claim_next(&self, parent: &CancellationToken) -> Next {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let now = Instant::now();

        while let Some(item) = inner.queue.pop(now) {
            // Stale entry: cancelled or evicted while queued.
            let Some(task) = inner.tasks.get_mut(&item.id) else {
                continue;
            };
            if !task.start(Utc::now()) {
                continue;
            }
            let cancel = parent.child_token();
            inner.attempts.insert(task.id, cancel.clone());
            let snapshot = task.clone();

            self.persist(&snapshot).await;
            self.bus.publish(
                Event::for_task(EventKind::TaskStarting, &snapshot).with_attempt(snapshot.attempt()),
            );
            drop(guard);
            self.changed.notify_waiters();
            return Next::Ready(Claim {
                task: snapshot,
                cancel,
            });
        }
        Next::Idle(inner.queue.next_deadline())
    }

    /// Applies the outcome of an attempt.
    ///
    /// A result for a task that is no longer `running` (cancelled or evicted
    /// meanwhile) is discarded.
    pub(crate) async fn finish(
        &self,
        id: TaskId,
        outcome: Result<Value, ExecError>,
        retry: &RetryPolicy,
    ) {
        let mut requeued = false;
        {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;
            inner.attempts.remove(&id);

            let Some(task) = inner.tasks.get_mut(&id) else {
                let mut ev = Event::new(EventKind::ResultDiscarded).with_reason("task evicted");
                ev.task_id = Some(id);
                self.bus.publish(ev);
                return;
            };
            let attempt = task.attempt();
            if task.status != TaskStatus::Running {
                self.bus.publish(
                    Event::for_task(EventKind::ResultDiscarded, task)
                        .with_attempt(attempt)
                        .with_reason(format!("task is {}", task.status)),
                );
                return;
            }

            let ev = match outcome {
                Ok(value) => {
                    task.complete(value.clone(), Utc::now());
                    Event::for_task(EventKind::TaskCompleted, task)
                        .with_attempt(attempt)
                        .with_data(value)
                }
                Err(err) => match retry.decide(task, &err) {
                    RetryDecision::Requeue { delay, .. } => {
                        let at = (!delay.is_zero()).then(|| eligible_after(delay));
                        task.requeue();
                        let item = QueueItem::from(&*task);
                        match at {
                            Some(at) => inner.queue.push_delayed(item, at),
                            None => inner.queue.push(item),
                        }
                        requeued = true;
                        Event::for_task(EventKind::TaskRetryScheduled, task)
                            .with_attempt(attempt)
                            .with_delay(delay)
                            .with_reason(err.to_string())
                    }
                    RetryDecision::Fail => {
                        task.fail(err.to_string(), Utc::now());
                        Event::for_task(EventKind::TaskFailed, task)
                            .with_attempt(attempt)
                            .with_reason(err.to_string())
                    }
                },
            };
            let snapshot = task.clone();
            self.persist(&snapshot).await;
            self.bus.publish(ev);
        }
        if requeued {
            self.wake.notify_one();
        }
        self.changed.notify_waiters();
    }

    /// Puts a `running` task back to `pending` after shutdown interrupted its attempt.
    pub(crate) async fn interrupt(&self, id: TaskId) {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        inner.attempts.remove(&id);
        let Some(task) = inner.tasks.get_mut(&id) else {
            return;
        };
        if !task.recover() {
            return;
        }
        let snapshot = task.clone();
        inner.queue.push(QueueItem::from(&snapshot));
        self.persist(&snapshot).await;
        self.bus.publish(
            Event::for_task(EventKind::TaskRecovered, &snapshot)
                .with_attempt(snapshot.attempt())
                .with_reason("interrupted by shutdown"),
        );
    }

    /// `pending | running → cancelled`; fires the running attempt's token.
    pub(crate) async fn cancel(&self, id: TaskId) -> bool {
        {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;
            let Some(task) = inner.tasks.get_mut(&id) else {
                return false;
            };
            let was_running = task.status == TaskStatus::Running;
            if !task.cancel(Utc::now()) {
                return false;
            }
            let snapshot = task.clone();
            if let Some(token) = inner.attempts.get(&id) {
                token.cancel();
            }
            self.persist(&snapshot).await;
            self.bus.publish(
                Event::for_task(EventKind::TaskCancelled, &snapshot).with_reason(if was_running {
                    "cancelled while running"
                } else {
                    "cancelled while pending"
                }),
            );
        }
        self.changed.notify_waiters();
        true
    }

    /// Removes terminal tasks finished at least `older_than` ago.
    pub(crate) async fn evict(&self, older_than: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return 0;
        };

        let evicted = {
            let mut inner = self.inner.lock().await;
            let ids: Vec<TaskId> = inner
                .tasks
                .values()
                .filter(|t| t.status.is_terminal() && t.finished_at() <= cutoff)
                .map(|t| t.id)
                .collect();

            for id in &ids {
                if let Some(task) = inner.tasks.remove(id) {
                    self.forget(task.id).await;
                    self.bus
                        .publish(Event::for_task(EventKind::TaskEvicted, &task));
                }
            }
            ids.len()
        };
        if evicted > 0 {
            self.changed.notify_waiters();
        }
        evicted
    }

    pub(crate) async fn get(&self, id: TaskId) -> Option<Task> {
        self.inner.lock().await.tasks.get(&id).cloned()
    }

    /// Matching tasks, newest first.
    pub(crate) async fn list(&self, filter: &TaskFilter) -> Vec<Task> {
        let mut tasks: Vec<Task> = {
            let inner = self.inner.lock().await;
            inner
                .tasks
                .values()
                .filter(|t| filter.matches(t))
                .cloned()
                .collect()
        };
        tasks.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.seq.cmp(&a.seq))
        });
        tasks
    }

    /// Tasks with an attempt currently in flight.
    pub(crate) async fn running_ids(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self.inner.lock().await.attempts.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Resolves once `id` is terminal.
    pub(crate) async fn wait(&self, id: TaskId, timeout: Duration) -> Result<Task, WaitError> {
        let until_terminal = async {
            loop {
                let notified = self.changed.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                match self.get(id).await {
                    None => return Err(WaitError::NotFound(id)),
                    Some(task) if task.status.is_terminal() => return Ok(task),
                    Some(_) => {}
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, until_terminal)
            .await
            .map_err(|_| WaitError::Timeout { id, timeout })?
    }
}

/// Instant a retry becomes eligible; saturates far in the future instead of overflowing.
fn eligible_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay)
        .unwrap_or_else(|| now + Duration::from_secs(FAR_FUTURE_SECS))
}

/// About thirty years.
const FAR_FUTURE_SECS: u64 = 86_400 * 365 * 30;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::MemoryJournal;
    use crate::tasks::{ExecutionContext, Priority, TaskType};
    use serde_json::json;

    fn task(priority: Priority, max_retries: u32) -> Task {
        Task::new(
            TaskType::TaskCreation,
            json!({"title": "Inspect scaffolding"}),
            ExecutionContext::new("user-1", "task-agent"),
            priority,
            max_retries,
        )
    }

    fn claimed(next: Next) -> Claim {
        match next {
            Next::Ready(claim) => claim,
            Next::Idle(_) => panic!("expected a claim"),
        }
    }

    #[tokio::test]
    async fn claim_follows_priority_and_skips_cancelled() {
        let store = TaskStore::new(Bus::new(64), None);
        let token = CancellationToken::new();
        let low = store.insert(task(Priority::Low, 0)).await;
        let high = store.insert(task(Priority::High, 0)).await;
        let critical = store.insert(task(Priority::Critical, 0)).await;
        assert!(store.cancel(critical).await);

        assert_eq!(claimed(store.claim_next(&token).await).task.id, high);
        assert_eq!(claimed(store.claim_next(&token).await).task.id, low);
        assert!(matches!(store.claim_next(&token).await, Next::Idle(None)));
    }

    #[tokio::test]
    async fn retryable_failure_requeues_until_budget_spent() {
        let store = TaskStore::new(Bus::new(64), None);
        let token = CancellationToken::new();
        let retry = RetryPolicy::new(crate::policies::BackoffPolicy::immediate());
        let id = store.insert(task(Priority::Medium, 1)).await;

        claimed(store.claim_next(&token).await);
        store.finish(id, Err(ExecError::fail("503")), &retry).await;
        let t = store.get(id).await.unwrap();
        assert_eq!((t.status, t.retry_count), (TaskStatus::Pending, 1));

        claimed(store.claim_next(&token).await);
        store.finish(id, Err(ExecError::fail("503")), &retry).await;
        let t = store.get(id).await.unwrap();
        assert_eq!((t.status, t.retry_count), (TaskStatus::Failed, 1));
        assert_eq!(t.error.as_deref(), Some("execution failed: 503"));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_parks_task_until_deadline() {
        let store = TaskStore::new(Bus::new(64), None);
        let token = CancellationToken::new();
        let retry = RetryPolicy::default();
        let id = store.insert(task(Priority::Medium, 3)).await;

        claimed(store.claim_next(&token).await);
        store.finish(id, Err(ExecError::fail("503")), &retry).await;
        let Next::Idle(Some(at)) = store.claim_next(&token).await else {
            panic!("expected a delayed retry");
        };
        tokio::time::sleep_until(at).await;
        assert_eq!(claimed(store.claim_next(&token).await).task.attempt(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn huge_backoff_parks_task_without_overflow() {
        let store = TaskStore::new(Bus::new(64), None);
        let token = CancellationToken::new();
        let retry = RetryPolicy::new(crate::policies::BackoffPolicy {
            first: Duration::MAX,
            max: Duration::MAX,
            factor: 1.0,
            jitter: crate::policies::JitterPolicy::None,
        });
        let id = store.insert(task(Priority::Medium, 3)).await;

        claimed(store.claim_next(&token).await);
        store.finish(id, Err(ExecError::fail("503")), &retry).await;
        assert_eq!(store.get(id).await.unwrap().status, TaskStatus::Pending);
        let Next::Idle(Some(at)) = store.claim_next(&token).await else {
            panic!("expected a delayed retry");
        };
        assert!(at > Instant::now() + Duration::from_secs(86_400 * 365));
    }

    #[tokio::test]
    async fn cancelling_running_task_fires_token_and_discards_result() {
        let bus = Bus::new(64);
        let store = TaskStore::new(bus.clone(), None);
        let token = CancellationToken::new();
        let id = store.insert(task(Priority::High, 3)).await;
        let claim = claimed(store.claim_next(&token).await);

        let mut rx = bus.subscribe();
        assert!(store.cancel(id).await);
        assert!(claim.cancel.is_cancelled());
        assert!(!store.cancel(id).await);

        store.finish(id, Ok(json!("late")), &RetryPolicy::default()).await;
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::TaskCancelled);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::ResultDiscarded);
        let t = store.get(id).await.unwrap();
        assert_eq!(t.status, TaskStatus::Cancelled);
        assert!(t.result.is_none());
    }

    #[tokio::test]
    async fn restore_requeues_running_and_continues_sequence() {
        let journal = Arc::new(MemoryJournal::new());
        let mut running = task(Priority::Low, 3);
        running.seq = 4;
        running.start(Utc::now());
        let mut done = task(Priority::High, 3);
        done.seq = 2;
        done.start(Utc::now());
        done.complete(json!(1), Utc::now());

        let store = TaskStore::new(Bus::new(64), Some(journal.clone()));
        assert_eq!(store.restore(vec![done.clone(), running.clone()]).await, 1);

        let token = CancellationToken::new();
        assert_eq!(claimed(store.claim_next(&token).await).task.id, running.id);
        let fresh = store.insert(task(Priority::Low, 0)).await;
        assert_eq!(store.get(fresh).await.unwrap().seq, 5);
        assert_eq!(store.get(done.id).await.unwrap().status, TaskStatus::Completed);
        assert_eq!(journal.len(), 2);
    }

    #[tokio::test]
    async fn evict_only_touches_old_terminal_tasks() {
        let journal = Arc::new(MemoryJournal::new());
        let store = TaskStore::new(Bus::new(64), Some(journal.clone()));
        let token = CancellationToken::new();
        let done = store.insert(task(Priority::High, 0)).await;
        let pending = store.insert(task(Priority::Low, 0)).await;
        claimed(store.claim_next(&token).await);
        store.finish(done, Ok(json!(null)), &RetryPolicy::default()).await;

        assert_eq!(store.evict(Duration::from_secs(3600)).await, 0);
        assert_eq!(store.evict(Duration::ZERO).await, 1);
        assert!(store.get(done).await.is_none());
        assert!(store.get(pending).await.is_some());
        assert_eq!(journal.len(), 1);
    }
}
