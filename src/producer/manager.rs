//! ProducerManager: bucketed and synchronous publishing

use crate::adapter::api::{AdapterError, AdapterState, Producer};
use crate::core::config::{PersistConfig, ProducerConfig};
use crate::core::controller::{Controller, SystemError, SystemResult};
use crate::core::error_handling::{log_recoverable, panic_message};
use crate::core::shutdown::wait_until;
use crate::core::sync::InFlightGuard;
use crate::model::payload::Payload;
use crate::model::pool::Pool;
use crate::model::registry::Registry;
use crate::model::status::Status;
use crate::producer::bucket::Bucket;
use crate::producer::error::{ProducerError, ProducerResult};
use crate::store::api::Store;
use async_trait::async_trait;
use futures::FutureExt;
use sha2::{Digest, Sha256};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const ABANDONED: &str = "producer stopped before the payload was sent";

/// Idempotency key of a batch: SHA-256 over the length-prefixed bodies
pub fn batch_hash(bodies: &[String]) -> String {
    let mut hasher = Sha256::new();
    for body in bodies {
        hasher.update((body.len() as u64).to_le_bytes());
        hasher.update(body.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// What [`ProducerManager::publish_batch`] did with each body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReceipt {
    pub hash: String,
    /// Accepted by the bucket
    pub queued: usize,
    /// Already succeeded or currently claimed
    pub skipped: usize,
    /// Stored WAITING but not queued; the retry sweep will send them
    pub deferred: usize,
}

struct Shared {
    producer: Arc<dyn Producer>,
    store: Arc<dyn Store>,
    payloads: Arc<Pool<Payload>>,
    bucket: Bucket<Payload>,
    config: ProducerConfig,
    persist: PersistConfig,
    workers: AtomicUsize,
    processing: Arc<AtomicUsize>,
    releasing: Arc<AtomicUsize>,
    stopping: AtomicBool,
}

impl Shared {
    fn quiet(&self) -> bool {
        self.workers.load(Ordering::Acquire) == 0
            && self.processing.load(Ordering::Acquire) == 0
            && self.releasing.load(Ordering::Acquire) == 0
            && self.bucket.count() == 0
    }

    /// Pop and send until the bucket is empty. Exits at once when the
    /// ceiling of concurrent drainers is already reached.
    async fn drain(&self) {
        let ceiling = self.config.concurrency.max(1);
        loop {
            if self.workers.fetch_add(1, Ordering::AcqRel) >= ceiling {
                self.workers.fetch_sub(1, Ordering::AcqRel);
                return;
            }
            while let Some(payload) = self.bucket.pop() {
                let _ = self.send(payload).await;
            }
            self.workers.fetch_sub(1, Ordering::AcqRel);

            // An add that raced the decrement may have seen a full house
            if self.bucket.count() == 0 {
                return;
            }
        }
    }

    async fn send(&self, mut payload: Payload) -> ProducerResult<String> {
        let _processing = InFlightGuard::enter(&self.processing);

        let state = self.producer.state();
        if state != AdapterState::Ready {
            payload.error = Some(format!("adapter producer is {}", state));
            self.complete(payload, false).await;
            return Err(ProducerError::AdapterNotHealthy { state });
        }

        payload.dequeue += 1;
        let started = Instant::now();
        let sent = AssertUnwindSafe(self.producer.publish(&payload))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(AdapterError::Panicked {
                    message: panic_message(&*panic),
                })
            });
        payload.duration = started.elapsed();

        match &sent {
            Ok(message_id) => payload.message_id = Some(message_id.clone()),
            Err(e) => {
                log::warn!(
                    "Publish to {}:{} failed on attempt {}: {}",
                    payload.topic_name,
                    payload.topic_tag,
                    payload.dequeue,
                    e
                );
                payload.error = Some(e.to_string());
            }
        }
        self.complete(payload, false).await;
        sent.map_err(ProducerError::from)
    }

    /// Persist the outcome and hand the payload back to the pool
    async fn complete(&self, payload: Payload, abandoned: bool) {
        let _releasing = InFlightGuard::enter(&self.releasing);

        let status = match payload.error {
            None => Status::Succeeded,
            Some(_) if !abandoned && payload.dequeue < self.config.max_retry => Status::Waiting,
            Some(_) => Status::Failed,
        };
        let wanted = match status {
            Status::Succeeded => self.persist.payload_succeeded,
            _ => self.persist.payload_failed,
        };

        let saved = if payload.record_id.is_some() {
            self.store.update_payload(payload.to_record(status)).await
        } else if wanted {
            self.store
                .save_payload(payload.to_record(status))
                .await
                .map(|_| ())
        } else {
            Ok(())
        };
        if let Err(e) = saved {
            log_recoverable(&e, "Persisting payload outcome");
        }

        self.payloads.release(payload);
    }
}

/// Shared producer front. Cheap to clone; every clone drives the same
/// bucket and counters.
#[derive(Clone)]
pub struct ProducerManager {
    shared: Arc<Shared>,
}

impl ProducerManager {
    pub fn new(
        producer: Arc<dyn Producer>,
        store: Arc<dyn Store>,
        payloads: Arc<Pool<Payload>>,
        config: ProducerConfig,
        persist: PersistConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                producer,
                store,
                payloads,
                bucket: Bucket::new(config.bucket_capacity),
                config,
                persist,
                workers: AtomicUsize::new(0),
                processing: Arc::new(AtomicUsize::new(0)),
                releasing: Arc::new(AtomicUsize::new(0)),
                stopping: AtomicBool::new(false),
            }),
        }
    }

    /// Queue a payload and return without waiting for the vendor
    ///
    /// Rejected payloads go straight back to the pool.
    pub fn publish(&self, payload: Payload) -> ProducerResult<()> {
        let shared = &self.shared;
        if shared.stopping.load(Ordering::Acquire) {
            shared.payloads.release(payload);
            return Err(ProducerError::Stopped);
        }

        let state = shared.producer.state();
        if state != AdapterState::Ready {
            shared.payloads.release(payload);
            return Err(ProducerError::AdapterNotHealthy { state });
        }

        if let Err(payload) = shared.bucket.add(payload) {
            shared.payloads.release(payload);
            return Err(ProducerError::BucketFull {
                capacity: shared.bucket.capacity(),
            });
        }

        let worker = shared.clone();
        tokio::spawn(async move { worker.drain().await });
        Ok(())
    }

    /// Send now, bypassing the bucket. Returns the vendor message id.
    pub async fn publish_sync(&self, payload: Payload) -> ProducerResult<String> {
        self.shared.send(payload).await
    }

    /// Publish a batch of bodies to `registry` exactly once per
    /// (hash, offset). Bodies already succeeded or claimed elsewhere are
    /// skipped; the rest are claimed PROCESSING before they are queued.
    pub async fn publish_batch(
        &self,
        registry: &Registry,
        bodies: &[String],
    ) -> ProducerResult<BatchReceipt> {
        let shared = &self.shared;
        let mut receipt = BatchReceipt {
            hash: batch_hash(bodies),
            ..BatchReceipt::default()
        };

        for (offset, body) in bodies.iter().enumerate() {
            let offset = offset as u32;

            // Rows are claimed PROCESSING before queueing so neither a
            // concurrent retry sweep nor a second batch can send the same
            // offset twice
            let claimed = match shared.store.find_payload(&receipt.hash, offset).await? {
                Some(record) if matches!(record.status, Status::Waiting | Status::Failed) => shared
                    .store
                    .transition_payload(record.id, record.status, Status::Processing)
                    .await?
                    .eq(&1)
                    .then_some((record.id, record.dequeue)),
                Some(_) => None,
                None => {
                    let mut record = Payload::default();
                    record.bind(registry, body);
                    record.hash.push_str(&receipt.hash);
                    record.offset = offset;
                    shared
                        .store
                        .insert_payload(record.to_record(Status::Processing))
                        .await?
                        .map(|id| (id, 0))
                }
            };
            let Some((record_id, dequeue)) = claimed else {
                receipt.skipped += 1;
                continue;
            };

            let mut payload = shared.payloads.acquire();
            payload.bind(registry, body);
            payload.hash.push_str(&receipt.hash);
            payload.offset = offset;
            payload.record_id = Some(record_id);
            payload.dequeue = dequeue;

            match self.publish(payload) {
                Ok(()) => receipt.queued += 1,
                Err(ProducerError::BucketFull { .. } | ProducerError::AdapterNotHealthy { .. }) => {
                    // Hand the row to the retry sweep
                    self.unclaim(record_id).await?;
                    receipt.deferred += 1
                }
                Err(e) => {
                    if let Err(store_err) = self.unclaim(record_id).await {
                        log_recoverable(&store_err, "Releasing batch payload claim");
                    }
                    return Err(e);
                }
            }
        }

        log::debug!(
            "Batch {} to {}: {} queued, {} skipped, {} deferred",
            receipt.hash,
            registry.key(),
            receipt.queued,
            receipt.skipped,
            receipt.deferred
        );
        Ok(receipt)
    }

    /// Put a claimed batch row back to WAITING for the retry sweep
    async fn unclaim(&self, record_id: u64) -> ProducerResult<()> {
        self.shared
            .store
            .transition_payload(record_id, Status::Processing, Status::Waiting)
            .await?;
        Ok(())
    }

    /// Payloads waiting in the bucket
    pub fn queued(&self) -> usize {
        self.shared.bucket.count()
    }

    /// True when nothing is queued, sending or being released
    pub fn idle(&self) -> bool {
        self.shared.quiet()
    }

    async fn shutdown(&self) -> SystemResult<()> {
        let shared = &self.shared;
        shared.stopping.store(true, Ordering::Release);

        let pending = shared.bucket.truncate();
        if !pending.is_empty() {
            log::warn!("Releasing {} queued payloads as failed", pending.len());
        }

        let width = shared.config.concurrency.max(1).min(pending.len().max(1));
        let mut lanes: Vec<Vec<Payload>> = (0..width).map(|_| Vec::new()).collect();
        for (i, payload) in pending.into_iter().enumerate() {
            lanes[i % width].push(payload);
        }
        let releases = lanes
            .into_iter()
            .filter(|lane| !lane.is_empty())
            .map(|lane| {
                let shared = shared.clone();
                tokio::spawn(async move {
                    for mut payload in lane {
                        payload.error = Some(ABANDONED.to_string());
                        shared.complete(payload, true).await;
                    }
                })
            });
        for joined in futures::future::join_all(releases).await {
            if let Err(e) = joined {
                log::warn!("Payload release worker ended abnormally: {}", e);
            }
        }

        let timeout = Duration::from_secs(shared.config.shutdown_timeout_secs);
        let drained = wait_until(|| shared.quiet(), timeout).await;

        if let Err(e) = shared.producer.stop().await {
            log_recoverable(&e, "Stopping adapter producer");
        }
        if !drained {
            return Err(SystemError::ShutdownTimeout {
                component: self.name().to_string(),
                timeout,
            });
        }
        log::info!("Producer stopped");
        Ok(())
    }
}

#[async_trait]
impl Controller for ProducerManager {
    fn name(&self) -> &'static str {
        "producer"
    }

    async fn start(&self) -> SystemResult<()> {
        self.shared.stopping.store(false, Ordering::Release);
        self.shared
            .producer
            .start()
            .await
            .map_err(|e| SystemError::StartFailed {
                component: self.name().to_string(),
                reason: e.to_string(),
            })?;
        log::info!(
            "Producer started (bucket {}, concurrency {})",
            self.shared.bucket.capacity(),
            self.shared.config.concurrency
        );
        Ok(())
    }

    async fn graceful_stop(&self) -> SystemResult<()> {
        self.shutdown().await
    }
}
