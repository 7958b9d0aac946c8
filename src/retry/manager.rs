//! RetryManager: claim and re-drive WAITING records

use crate::cache::api::MemoryCache;
use crate::consumer::api::ConsumeExecutor;
use crate::core::config::RetryConfig;
use crate::core::controller::{Controller, SystemResult};
use crate::core::error_handling::log_recoverable;
use crate::model::message::Message;
use crate::model::payload::Payload;
use crate::model::pool::Pool;
use crate::model::status::Status;
use crate::producer::api::ProducerManager;
use crate::retry::error::RetryResult;
use crate::store::api::{MessageRecord, Store};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Per-kind in-progress flag, cleared on drop
struct SweepGuard<'a>(&'a AtomicBool);

impl<'a> SweepGuard<'a> {
    fn try_enter(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Counts for one sweep of one kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Claimed and re-driven
    pub claimed: usize,
    /// Claim affected no row
    pub conflicts: usize,
    /// Claimed but marked FAILED without a retry (task gone)
    pub abandoned: usize,
}

struct Inner {
    store: Arc<dyn Store>,
    cache: Arc<MemoryCache>,
    executor: Arc<ConsumeExecutor>,
    producer: ProducerManager,
    messages: Arc<Pool<Message>>,
    payloads: Arc<Pool<Payload>>,
    interval: Duration,
    batch_size: usize,
    sweeping_messages: AtomicBool,
    sweeping_payloads: AtomicBool,
    wake: Notify,
    control: Mutex<Option<(oneshot::Sender<()>, JoinHandle<()>)>>,
}

#[derive(Clone)]
pub struct RetryManager {
    inner: Arc<Inner>,
}

impl RetryManager {
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<MemoryCache>,
        executor: Arc<ConsumeExecutor>,
        producer: ProducerManager,
        messages: Arc<Pool<Message>>,
        payloads: Arc<Pool<Payload>>,
        config: &RetryConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                cache,
                executor,
                producer,
                messages,
                payloads,
                interval: Duration::from_secs(config.interval_secs.max(1)),
                batch_size: config.batch_size.max(1),
                sweeping_messages: AtomicBool::new(false),
                sweeping_payloads: AtomicBool::new(false),
                wake: Notify::new(),
                control: Mutex::new(None),
            }),
        }
    }

    /// Sweep now instead of waiting for the next tick
    pub fn trigger(&self) {
        self.inner.wake.notify_one();
    }

    /// Re-drive WAITING messages. Returns `None` when a message sweep is
    /// already running.
    pub async fn sweep_messages(&self) -> RetryResult<Option<SweepReport>> {
        let inner = &self.inner;
        let Some(_sweep) = SweepGuard::try_enter(&inner.sweeping_messages) else {
            return Ok(None);
        };

        let mut report = SweepReport::default();
        let mut after_id = 0;
        loop {
            let batch = inner
                .store
                .list_waiting_messages(after_id, inner.batch_size)
                .await?;
            let full = batch.len() == inner.batch_size;

            for record in batch {
                after_id = after_id.max(record.id);
                let claimed = inner
                    .store
                    .transition_message(record.id, Status::Waiting, Status::Processing)
                    .await?;
                if claimed != 1 {
                    report.conflicts += 1;
                    continue;
                }

                let Some(task) = inner.cache.task(record.task_id) else {
                    self.abandon_message(record).await?;
                    report.abandoned += 1;
                    continue;
                };

                let mut message = inner.messages.acquire();
                message.load_record(&record);
                message.dequeue = message.dequeue.max(1);
                inner.executor.execute(task, message).await;
                report.claimed += 1;
            }

            // A full batch means more backlog; keep going without a tick
            if !full {
                break;
            }
        }
        Ok(Some(report))
    }

    async fn abandon_message(&self, mut record: MessageRecord) -> RetryResult<()> {
        log::warn!(
            "Message record {}: task {} is not loaded, marking failed",
            record.id,
            record.task_id
        );
        record.status = Status::Failed;
        record.error = Some(format!("task {} is not loaded", record.task_id));
        self.inner.store.update_message(record).await?;
        Ok(())
    }

    /// Re-send WAITING payloads. Returns `None` when a payload sweep is
    /// already running.
    pub async fn sweep_payloads(&self) -> RetryResult<Option<SweepReport>> {
        let inner = &self.inner;
        let Some(_sweep) = SweepGuard::try_enter(&inner.sweeping_payloads) else {
            return Ok(None);
        };

        let mut report = SweepReport::default();
        let mut after_id = 0;
        loop {
            let batch = inner
                .store
                .list_waiting_payloads(after_id, inner.batch_size)
                .await?;
            let full = batch.len() == inner.batch_size;

            for record in batch {
                after_id = after_id.max(record.id);
                let claimed = inner
                    .store
                    .transition_payload(record.id, Status::Waiting, Status::Processing)
                    .await?;
                if claimed != 1 {
                    report.conflicts += 1;
                    continue;
                }

                let mut payload = inner.payloads.acquire();
                payload.load_record(&record);
                // The outcome is persisted by the producer either way
                if let Err(e) = inner.producer.publish_sync(payload).await {
                    log::debug!("Payload record {} resend failed: {}", record.id, e);
                }
                report.claimed += 1;
            }

            if !full {
                break;
            }
        }
        Ok(Some(report))
    }

    async fn sweep_all(&self) {
        match self.sweep_messages().await {
            Ok(Some(report)) if report != SweepReport::default() => log::info!(
                "Message retry sweep: {} re-driven, {} owned elsewhere, {} abandoned",
                report.claimed,
                report.conflicts,
                report.abandoned
            ),
            Ok(_) => {}
            Err(e) => log_recoverable(&e, "Message retry sweep"),
        }
        match self.sweep_payloads().await {
            Ok(Some(report)) if report != SweepReport::default() => log::info!(
                "Payload retry sweep: {} re-sent, {} owned elsewhere",
                report.claimed,
                report.conflicts
            ),
            Ok(_) => {}
            Err(e) => log_recoverable(&e, "Payload retry sweep"),
        }
    }

    async fn run_loop(self, mut stop_rx: oneshot::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.inner.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                _ = ticker.tick() => {}
                _ = self.inner.wake.notified() => {}
            }
            self.sweep_all().await;
        }
        log::debug!("Retry loop exited");
    }
}

#[async_trait]
impl Controller for RetryManager {
    fn name(&self) -> &'static str {
        "retry"
    }

    async fn start(&self) -> SystemResult<()> {
        let mut control = self.inner.control.lock().await;
        if control.is_none() {
            let (stop_tx, stop_rx) = oneshot::channel();
            let handle = tokio::spawn(self.clone().run_loop(stop_rx));
            *control = Some((stop_tx, handle));
            log::info!(
                "Retry sweeps every {:?}, batches of {}",
                self.inner.interval,
                self.inner.batch_size
            );
        }
        Ok(())
    }

    /// Waits for a running sweep to finish
    async fn graceful_stop(&self) -> SystemResult<()> {
        if let Some((stop_tx, handle)) = self.inner.control.lock().await.take() {
            let _ = stop_tx.send(());
            if let Err(e) = handle.await {
                log::warn!("Retry loop ended abnormally: {}", e);
            }
        }
        Ok(())
    }
}
