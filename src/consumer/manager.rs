//! ConsumerManager: reconcile running consumers against the snapshot

use crate::adapter::api::{AdapterFactory, Consumer, MessageHandler};
use crate::cache::api::MemoryCache;
use crate::consumer::error::{ConsumerError, ConsumerResult};
use crate::consumer::executor::ConsumeExecutor;
use crate::core::config::Config;
use crate::core::controller::{Controller, SystemError, SystemResult};
use crate::core::error_handling::log_recoverable;
use crate::core::retry::{retry_async, RetryPolicy};
use crate::core::shutdown::wait_until;
use crate::core::sync::handle_mutex_poison;
use crate::model::task::Task;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// What one reconciliation changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub started: usize,
    pub restarted: usize,
    pub stopped: usize,
    /// Slots that failed to start; retried on the next pass
    pub failed: usize,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        self.started + self.restarted + self.stopped > 0
    }
}

#[derive(Default)]
struct Bookkeeping {
    /// `Task.updated` seen by the last reconciliation
    versions: HashMap<u64, i64>,
    running: HashMap<String, Arc<dyn Consumer>>,
}

#[derive(Default)]
struct Plan {
    start: Vec<(Arc<Task>, u32)>,
    restart: Vec<(Arc<Task>, u32, Arc<dyn Consumer>)>,
    stop: Vec<Arc<dyn Consumer>>,
}

struct Inner {
    cache: Arc<MemoryCache>,
    adapter: Arc<dyn AdapterFactory>,
    executor: Arc<ConsumeExecutor>,
    provision: RetryPolicy,
    reload_interval: Duration,
    shutdown_timeout: Duration,
    book: Mutex<Bookkeeping>,
    reconciling: tokio::sync::Mutex<()>,
    wake: Notify,
    control: tokio::sync::Mutex<Option<(oneshot::Sender<()>, JoinHandle<()>)>>,
}

/// Keeps one vendor consumer running per `(task, parallel)` slot
#[derive(Clone)]
pub struct ConsumerManager {
    inner: Arc<Inner>,
}

impl ConsumerManager {
    pub fn new(
        cache: Arc<MemoryCache>,
        adapter: Arc<dyn AdapterFactory>,
        executor: Arc<ConsumeExecutor>,
        config: &Config,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache,
                adapter,
                executor,
                provision: RetryPolicy::new(
                    config.adapter.provision_attempts,
                    Duration::from_millis(config.adapter.provision_delay_ms),
                ),
                reload_interval: config.reload_interval(),
                shutdown_timeout: config.consumer_shutdown_timeout(),
                book: Mutex::new(Bookkeeping::default()),
                reconciling: tokio::sync::Mutex::new(()),
                wake: Notify::new(),
                control: tokio::sync::Mutex::new(None),
            }),
        }
    }

    pub fn executor(&self) -> &Arc<ConsumeExecutor> {
        &self.inner.executor
    }

    /// Ask the background loop to reconcile now instead of at the next tick
    pub fn reload(&self) {
        self.inner.wake.notify_one();
    }

    /// Keys of the running consumers, sorted
    pub fn running_keys(&self) -> ConsumerResult<Vec<String>> {
        let book = self.book()?;
        let mut keys: Vec<String> = book.running.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn book(&self) -> ConsumerResult<std::sync::MutexGuard<'_, Bookkeeping>> {
        handle_mutex_poison(self.inner.book.lock(), |message| ConsumerError::Internal {
            message,
        })
    }

    /// Reload the snapshot, provision vendor resources, then start, restart
    /// and stop consumers until the running set matches the snapshot.
    ///
    /// A failed reload keeps the previous snapshot.
    pub async fn reconcile(&self) -> ConsumerResult<ReconcileReport> {
        let _serial = self.inner.reconciling.lock().await;

        if let Err(e) = self.inner.cache.reload().await {
            log_recoverable(&e, "Reloading task snapshot");
        }
        let tasks = self.inner.cache.tasks();
        self.provision(&tasks).await;

        let plan = self.plan(&tasks)?;
        let mut report = ReconcileReport::default();

        for consumer in plan.stop {
            self.halt(consumer.as_ref()).await;
            log::info!("Consumer {} stopped", consumer.key());
            report.stopped += 1;
        }
        for (task, parallel, previous) in plan.restart {
            self.halt(previous.as_ref()).await;
            if self.launch(task, parallel).await? {
                report.restarted += 1;
            } else {
                report.failed += 1;
            }
        }
        for (task, parallel) in plan.start {
            if self.launch(task, parallel).await? {
                report.started += 1;
            } else {
                report.failed += 1;
            }
        }

        if report.changed() || report.failed > 0 {
            log::info!(
                "Reconciled consumers: {} started, {} restarted, {} stopped, {} failed",
                report.started,
                report.restarted,
                report.stopped,
                report.failed
            );
        }
        Ok(report)
    }

    /// Ensure every topic and subscription exists with the wanted filter
    async fn provision(&self, tasks: &HashMap<u64, Arc<Task>>) {
        let remoter = self.inner.adapter.remoter();
        let snapshot = self.inner.cache.snapshot();

        for registry in snapshot.registries() {
            let ensured = retry_async("ensure_topic", self.inner.provision.clone(), || {
                remoter.ensure_topic(registry)
            })
            .await;
            if let Err(e) = ensured {
                log_recoverable(&e, &format!("Provisioning topic {}", registry.topic_name));
            }
        }

        for task in tasks.values() {
            for parallel in 0..task.parallels {
                let ensured = retry_async("ensure_subscription", self.inner.provision.clone(), || {
                    remoter.ensure_subscription(task, parallel)
                })
                .await;
                if let Err(e) = ensured {
                    log_recoverable(
                        &e,
                        &format!("Provisioning subscription for {}", task.consumer_key(parallel)),
                    );
                }
            }
        }
    }

    /// Compare the snapshot with the running set under the bookkeeping lock
    fn plan(&self, tasks: &HashMap<u64, Arc<Task>>) -> ConsumerResult<Plan> {
        let mut book = self.book()?;
        let mut plan = Plan::default();
        let mut desired = HashSet::new();

        for task in tasks.values() {
            let changed = book
                .versions
                .insert(task.id, task.updated)
                .is_some_and(|previous| previous != task.updated);

            for parallel in 0..task.parallels {
                let key = task.consumer_key(parallel);
                match book.running.get(&key) {
                    None => plan.start.push((task.clone(), parallel)),
                    Some(consumer) if changed => {
                        plan.restart.push((task.clone(), parallel, consumer.clone()))
                    }
                    Some(_) => {}
                }
                desired.insert(key);
            }
        }

        book.versions.retain(|id, _| tasks.contains_key(id));
        let retired: Vec<String> = book
            .running
            .keys()
            .filter(|key| !desired.contains(*key))
            .cloned()
            .collect();
        for key in retired {
            if let Some(consumer) = book.running.remove(&key) {
                plan.stop.push(consumer);
            }
        }

        // Start order is cosmetic but keeps logs readable
        plan.start.sort_by_key(|(task, parallel)| (task.id, *parallel));
        Ok(plan)
    }

    /// Build and start one slot. Returns whether it is running.
    async fn launch(&self, task: Arc<Task>, parallel: u32) -> ConsumerResult<bool> {
        let key = task.consumer_key(parallel);
        let handler: Arc<dyn MessageHandler> = self.inner.executor.clone();

        let started = match self.inner.adapter.consumer(task, parallel, handler) {
            Ok(consumer) => consumer.start().await.map(|()| consumer),
            Err(e) => Err(e),
        };

        let mut book = self.book()?;
        match started {
            Ok(consumer) => {
                log::info!("Consumer {} running", key);
                book.running.insert(key, consumer);
                Ok(true)
            }
            Err(e) => {
                book.running.remove(&key);
                log_recoverable(&e, &format!("Starting consumer {}", key));
                Ok(false)
            }
        }
    }

    async fn halt(&self, consumer: &dyn Consumer) {
        if let Err(e) = consumer.stop().await {
            log_recoverable(&e, &format!("Stopping consumer {}", consumer.key()));
        }
    }

    async fn run_loop(self, mut stop_rx: oneshot::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.inner.reload_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                _ = ticker.tick() => {}
                _ = self.inner.wake.notified() => {}
            }
            if let Err(e) = self.reconcile().await {
                log_recoverable(&e, "Reconciling consumers");
            }
        }
        log::debug!("Consumer reconciliation loop exited");
    }
}

#[async_trait]
impl Controller for ConsumerManager {
    fn name(&self) -> &'static str {
        "consumer"
    }

    async fn start(&self) -> SystemResult<()> {
        let mut control = self.inner.control.lock().await;
        if control.is_some() {
            return Ok(());
        }

        self.reconcile()
            .await
            .map_err(|e| SystemError::StartFailed {
                component: self.name().to_string(),
                reason: e.to_string(),
            })?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(self.clone().run_loop(stop_rx));
        *control = Some((stop_tx, handle));
        Ok(())
    }

    async fn graceful_stop(&self) -> SystemResult<()> {
        if let Some((stop_tx, handle)) = self.inner.control.lock().await.take() {
            let _ = stop_tx.send(());
            if let Err(e) = handle.await {
                log::warn!("Consumer reconciliation loop ended abnormally: {}", e);
            }
        }

        let _serial = self.inner.reconciling.lock().await;
        let consumers: Vec<Arc<dyn Consumer>> = {
            let mut book = self.book().map_err(|e| SystemError::CoordinationFailed {
                operation: "consumer shutdown".to_string(),
                reason: e.to_string(),
            })?;
            book.versions.clear();
            let drained = book.running.drain().map(|(_, consumer)| consumer).collect();
            drained
        };
        futures::future::join_all(consumers.iter().map(|consumer| self.halt(consumer.as_ref())))
            .await;

        let executor = &self.inner.executor;
        if !wait_until(|| executor.idle(), self.inner.shutdown_timeout).await {
            return Err(SystemError::ShutdownTimeout {
                component: self.name().to_string(),
                timeout: self.inner.shutdown_timeout,
            });
        }
        log::info!("Consumers stopped ({} slots)", consumers.len());
        Ok(())
    }
}
