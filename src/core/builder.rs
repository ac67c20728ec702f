use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{config::Config, dispatcher::Dispatcher, engine::Engine, store::TaskStore};
use crate::{
    error::RuntimeError,
    events::Bus,
    executors::{ExecutorRef, ExecutorRegistry},
    journal::Journal,
    policies::RetryPolicy,
    subscribers::{Subscribe, SubscriberSet},
    tasks::TaskType,
};

/// Builder for constructing an [`Engine`].
pub struct EngineBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    executors: Vec<(TaskType, ExecutorRef)>,
    journal: Option<Arc<dyn Journal>>,
}

impl EngineBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            executors: Vec::new(),
            journal: None,
        }
    }

    /// Sets event subscribers (event log, notifications, logging, ...).
    ///
    /// Each subscriber gets a dedicated worker with a bounded queue.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one subscriber.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Registers an executor before startup; later registrations for the same type win.
    pub fn with_executor(mut self, task_type: impl Into<TaskType>, executor: ExecutorRef) -> Self {
        self.executors.push((task_type.into(), executor));
        self
    }

    /// Enables durability: snapshots go to `journal`, and it is replayed on build.
    pub fn with_journal(mut self, journal: Arc<dyn Journal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Builds the engine and starts its dispatcher.
    ///
    /// Must be called within a tokio runtime. With a journal configured, the
    /// journal is replayed first; interrupted `running` tasks are requeued.
    pub async fn build(self) -> Result<Arc<Engine>, RuntimeError> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        let subscriber_count = subs.len();
        let listener_token = CancellationToken::new();
        let listener = subscriber_listener(&bus, subs, listener_token.clone());

        let registry = Arc::new(ExecutorRegistry::new());
        for (task_type, executor) in self.executors {
            registry.register(task_type, executor);
        }

        let store = Arc::new(TaskStore::new(bus.clone(), self.journal.clone()));
        if let Some(journal) = &self.journal {
            let tasks = journal.load().await?;
            let total = tasks.len();
            let recovered = store.restore(tasks).await;
            tracing::info!(total, recovered, "journal replayed");
        }

        let runtime_token = CancellationToken::new();
        let dispatcher = Dispatcher {
            store: Arc::clone(&store),
            executors: Arc::clone(&registry),
            bus: bus.clone(),
            retry: RetryPolicy::new(self.cfg.backoff),
            timeout: self.cfg.attempt_timeout(),
            dispatch_delay: self.cfg.dispatch_delay,
            slots: Arc::new(Semaphore::new(self.cfg.worker_slots())),
        };
        let handle = tokio::spawn(dispatcher.run(runtime_token.clone()));

        if let Some(retention) = self.cfg.retention_window() {
            spawn_evictor(
                Arc::clone(&store),
                retention,
                self.cfg.evict_interval,
                runtime_token.clone(),
            );
        }

        Ok(Arc::new(Engine {
            cfg: self.cfg,
            bus,
            store,
            executors: registry,
            subscriber_count,
            runtime_token,
            listener_token,
            dispatcher: Mutex::new(Some(handle)),
            listener: Mutex::new(listener),
        }))
    }
}

/// Forwards bus events to the subscriber set (fire-and-forget).
///
/// Subscribes before returning so no event published afterwards is missed.
/// Once `stop` fires, events already on the bus are forwarded and the set is
/// drained before the task ends.
fn subscriber_listener(
    bus: &Bus,
    set: SubscriberSet,
    stop: CancellationToken,
) -> Option<JoinHandle<()>> {
    if set.is_empty() {
        return None;
    }
    let mut rx = bus.subscribe();
    Some(tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                res = rx.recv() => match res {
                    Ok(ev) => set.emit_arc(Arc::new(ev)),
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "subscriber listener lagged behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = stop.cancelled() => break,
            }
        }
        loop {
            match rx.try_recv() {
                Ok(ev) => set.emit_arc(Arc::new(ev)),
                Err(TryRecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "subscriber listener lagged behind the bus");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        set.shutdown().await;
    }))
}

/// Periodically evicts terminal tasks older than `retention`.
fn spawn_evictor(
    store: Arc<TaskStore>,
    retention: Duration,
    every: Duration,
    token: CancellationToken,
) {
    let every = every.max(Duration::from_millis(10));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let n = store.evict(retention).await;
                    if n > 0 {
                        tracing::debug!(evicted = n, "retention sweep");
                    }
                }
            }
        }
    });
}
