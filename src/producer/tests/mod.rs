//! ProducerManager behaviour against a scripted vendor producer

use crate::adapter::api::{AdapterError, AdapterResult, AdapterState, Producer, StateCell};
use crate::core::config::{PersistConfig, ProducerConfig};
use crate::core::controller::Controller;
use crate::core::shutdown::wait_until;
use crate::model::payload::Payload;
use crate::model::pool::Pool;
use crate::model::registry::Registry;
use crate::model::status::Status;
use crate::producer::api::{batch_hash, ProducerError, ProducerManager};
use crate::store::api::InMemoryStore;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Vendor producer whose outcome and timing the test controls
pub(crate) struct ScriptedProducer {
    state: StateCell,
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    pub panic: AtomicBool,
    gate: Option<Semaphore>,
}

impl ScriptedProducer {
    pub fn new() -> Self {
        Self {
            state: StateCell::new(AdapterState::Stopped),
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            panic: AtomicBool::new(false),
            gate: None,
        }
    }

    /// Every publish blocks until [`ScriptedProducer::open`] is called
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    pub fn open(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1 << 16);
        }
    }

    pub fn set_state(&self, state: AdapterState) {
        self.state.set(state);
    }
}

#[async_trait]
impl Producer for ScriptedProducer {
    fn state(&self) -> AdapterState {
        self.state.get()
    }

    async fn start(&self) -> AdapterResult<()> {
        self.state.set(AdapterState::Ready);
        Ok(())
    }

    async fn publish(&self, payload: &Payload) -> AdapterResult<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.unwrap();
        }
        if self.panic.load(Ordering::SeqCst) {
            panic!("vendor exploded");
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(AdapterError::Vendor {
                message: format!("rejected {}", payload.message_body),
            });
        }
        Ok(format!("SCRIPTED-{}", call))
    }

    async fn stop(&self) -> AdapterResult<()> {
        self.state.set(AdapterState::Stopped);
        Ok(())
    }
}

struct Harness {
    vendor: Arc<ScriptedProducer>,
    store: Arc<InMemoryStore>,
    pool: Arc<Pool<Payload>>,
    manager: ProducerManager,
}

impl Harness {
    fn new(vendor: ScriptedProducer, config: ProducerConfig, persist: PersistConfig) -> Self {
        let vendor = Arc::new(vendor);
        let store = Arc::new(InMemoryStore::new());
        let pool = Arc::new(Pool::new(16));
        let manager = ProducerManager::new(
            vendor.clone(),
            store.clone(),
            pool.clone(),
            config,
            persist,
        );
        Self {
            vendor,
            store,
            pool,
            manager,
        }
    }

    fn payload(&self, body: &str) -> Payload {
        let mut payload = self.pool.acquire();
        payload.bind(&Registry::new(1, "orders", "created"), body);
        payload
    }
}

fn persist_everything() -> PersistConfig {
    PersistConfig {
        payload_succeeded: true,
        payload_failed: true,
        ..PersistConfig::default()
    }
}

#[tokio::test]
async fn test_unhealthy_adapter_is_never_called() {
    let harness = Harness::new(
        ScriptedProducer::new(),
        ProducerConfig::default(),
        PersistConfig::default(),
    );

    let queued = harness.manager.publish(harness.payload("a"));
    assert!(matches!(
        queued,
        Err(ProducerError::AdapterNotHealthy {
            state: AdapterState::Stopped
        })
    ));

    harness.vendor.set_state(AdapterState::Restarting);
    let sent = harness.manager.publish_sync(harness.payload("b")).await;
    assert!(matches!(
        sent,
        Err(ProducerError::AdapterNotHealthy {
            state: AdapterState::Restarting
        })
    ));

    assert_eq!(harness.vendor.calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.manager.queued(), 0);
}

#[tokio::test]
async fn test_bucket_full_rejects_without_blocking() {
    let harness = Harness::new(
        ScriptedProducer::gated(),
        ProducerConfig {
            bucket_capacity: 1,
            concurrency: 1,
            ..ProducerConfig::default()
        },
        PersistConfig::default(),
    );
    harness.manager.start().await.unwrap();

    // First payload is popped and parks inside the vendor call
    harness.manager.publish(harness.payload("first")).unwrap();
    assert!(
        wait_until(
            || harness.vendor.calls.load(Ordering::SeqCst) == 1,
            Duration::from_secs(2)
        )
        .await
    );

    harness.manager.publish(harness.payload("second")).unwrap();
    assert_eq!(harness.manager.queued(), 1);

    let rejected = harness.manager.publish(harness.payload("third"));
    assert!(matches!(
        rejected,
        Err(ProducerError::BucketFull { capacity: 1 })
    ));
    assert_eq!(harness.manager.queued(), 1);

    harness.vendor.open();
    assert!(wait_until(|| harness.manager.idle(), Duration::from_secs(2)).await);
    assert_eq!(harness.vendor.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_publish_sync_persists_success_when_enabled() {
    let harness = Harness::new(
        ScriptedProducer::new(),
        ProducerConfig::default(),
        persist_everything(),
    );
    harness.manager.start().await.unwrap();

    let id = harness
        .manager
        .publish_sync(harness.payload("{\"n\":1}"))
        .await
        .unwrap();
    assert_eq!(id, "SCRIPTED-1");

    let records = harness.store.payloads().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, Status::Succeeded);
    assert_eq!(records[0].dequeue, 1);
    assert_eq!(records[0].message_id.as_deref(), Some("SCRIPTED-1"));
    assert_eq!(harness.pool.idle_count(), 1);
}

#[tokio::test]
async fn test_failed_send_waits_until_retry_ceiling() {
    let harness = Harness::new(
        ScriptedProducer::new(),
        ProducerConfig {
            max_retry: 2,
            ..ProducerConfig::default()
        },
        PersistConfig::default(),
    );
    harness.vendor.fail.store(true, Ordering::SeqCst);
    harness.manager.start().await.unwrap();

    let first = harness.manager.publish_sync(harness.payload("x")).await;
    assert!(matches!(first, Err(ProducerError::Adapter(_))));
    let record = harness.store.payloads().unwrap().remove(0);
    assert_eq!(record.status, Status::Waiting);
    assert_eq!(record.dequeue, 1);

    // Replay the stored record the way the retry sweep does
    let mut replay = harness.pool.acquire();
    replay.load_record(&record);
    let second = harness.manager.publish_sync(replay).await;
    assert!(second.is_err());

    let record = harness.store.payload(record.id).unwrap().unwrap();
    assert_eq!(record.status, Status::Failed);
    assert_eq!(record.dequeue, 2);
    assert_eq!(record.error.as_deref(), Some("Vendor call failed: rejected x"));
}

#[tokio::test]
async fn test_vendor_panic_becomes_error() {
    let harness = Harness::new(
        ScriptedProducer::new(),
        ProducerConfig::default(),
        PersistConfig::default(),
    );
    harness.vendor.panic.store(true, Ordering::SeqCst);
    harness.manager.start().await.unwrap();

    let sent = harness.manager.publish_sync(harness.payload("boom")).await;
    match sent {
        Err(ProducerError::Adapter(AdapterError::Panicked { message })) => {
            assert_eq!(message, "vendor exploded")
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(harness.manager.idle());
}

#[tokio::test]
async fn test_publish_batch_skips_succeeded_offsets() {
    let harness = Harness::new(
        ScriptedProducer::new(),
        ProducerConfig::default(),
        persist_everything(),
    );
    harness.manager.start().await.unwrap();
    let registry = Registry::new(1, "orders", "created");
    let bodies = vec!["a".to_string(), "b".to_string(), "c".to_string()];

    let receipt = harness
        .manager
        .publish_batch(&registry, &bodies)
        .await
        .unwrap();
    assert_eq!(receipt.hash, batch_hash(&bodies));
    assert_eq!(receipt.queued, 3);
    assert!(wait_until(|| harness.manager.idle(), Duration::from_secs(2)).await);

    let again = harness
        .manager
        .publish_batch(&registry, &bodies)
        .await
        .unwrap();
    assert_eq!(again.skipped, 3);
    assert_eq!(again.queued, 0);
    assert_eq!(harness.vendor.calls.load(Ordering::SeqCst), 3);

    let records = harness.store.payloads().unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.status == Status::Succeeded));
}

#[test]
fn test_batch_hash_depends_on_boundaries() {
    let split = vec!["ab".to_string(), "c".to_string()];
    let joined = vec!["a".to_string(), "bc".to_string()];
    assert_ne!(batch_hash(&split), batch_hash(&joined));
    assert_eq!(batch_hash(&split), batch_hash(&split.clone()));
    assert_eq!(batch_hash(&split).len(), 64);
}

#[tokio::test]
async fn test_stop_releases_queued_payloads_as_failed() {
    let harness = Harness::new(
        ScriptedProducer::gated(),
        ProducerConfig {
            concurrency: 1,
            ..ProducerConfig::default()
        },
        PersistConfig::default(),
    );
    harness.manager.start().await.unwrap();

    harness.manager.publish(harness.payload("in-flight")).unwrap();
    assert!(
        wait_until(
            || harness.vendor.calls.load(Ordering::SeqCst) == 1,
            Duration::from_secs(2)
        )
        .await
    );
    harness.manager.publish(harness.payload("queued-1")).unwrap();
    harness.manager.publish(harness.payload("queued-2")).unwrap();

    let manager = harness.manager.clone();
    let stopping = tokio::spawn(async move { manager.graceful_stop().await });
    assert!(
        wait_until(
            || harness.store.payloads().unwrap().len() == 2,
            Duration::from_secs(2)
        )
        .await
    );
    harness.vendor.open();
    stopping.await.unwrap().unwrap();

    let records = harness.store.payloads().unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.status == Status::Failed));
    assert_eq!(harness.vendor.calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.vendor.state(), AdapterState::Stopped);
    assert!(matches!(
        harness.manager.publish(harness.payload("late")),
        Err(ProducerError::Stopped)
    ));
}

#[tokio::test]
async fn test_publish_batch_defers_rows_while_unhealthy() {
    let harness = Harness::new(
        ScriptedProducer::new(),
        ProducerConfig::default(),
        PersistConfig::default(),
    );
    let registry = Registry::new(1, "orders", "created");
    let bodies = vec!["a".to_string(), "b".to_string()];

    let receipt = harness
        .manager
        .publish_batch(&registry, &bodies)
        .await
        .unwrap();
    assert_eq!(receipt.deferred, 2);
    assert_eq!(receipt.queued, 0);
    let records = harness.store.payloads().unwrap();
    assert!(records.iter().all(|r| r.status == Status::Waiting && r.dequeue == 0));

    // Re-submitting the batch claims the waiting rows back
    harness.manager.start().await.unwrap();
    let again = harness
        .manager
        .publish_batch(&registry, &bodies)
        .await
        .unwrap();
    assert_eq!(again.queued, 2);
    assert!(wait_until(|| harness.manager.idle(), Duration::from_secs(2)).await);

    let records = harness.store.payloads().unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.status == Status::Succeeded && r.dequeue == 1));
}

#[tokio::test]
async fn test_publish_batch_after_stop_returns_claim() {
    let harness = Harness::new(
        ScriptedProducer::new(),
        ProducerConfig::default(),
        PersistConfig::default(),
    );
    harness.manager.start().await.unwrap();
    harness.manager.graceful_stop().await.unwrap();
    let registry = Registry::new(1, "orders", "created");
    let bodies = vec!["a".to_string(), "b".to_string()];

    let refused = harness.manager.publish_batch(&registry, &bodies).await;
    assert!(matches!(refused, Err(ProducerError::Stopped)));
    let records = harness.store.payloads().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, Status::Waiting);

    // The row is claimable again once the producer is back
    harness.manager.start().await.unwrap();
    let receipt = harness
        .manager
        .publish_batch(&registry, &bodies)
        .await
        .unwrap();
    assert_eq!(receipt.queued, 2);
    assert!(wait_until(|| harness.manager.idle(), Duration::from_secs(2)).await);

    let records = harness.store.payloads().unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.status == Status::Succeeded));
    assert_eq!(harness.vendor.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_identical_batches_send_each_offset_once() {
    let harness = Harness::new(
        ScriptedProducer::new(),
        ProducerConfig::default(),
        persist_everything(),
    );
    harness.manager.start().await.unwrap();
    let bodies: Vec<String> = (0..6).map(|i| format!("order-{}", i)).collect();

    let submissions: Vec<_> = (0..2)
        .map(|_| {
            let manager = harness.manager.clone();
            let bodies = bodies.clone();
            tokio::spawn(async move {
                let registry = Registry::new(1, "orders", "created");
                manager.publish_batch(&registry, &bodies).await
            })
        })
        .collect();

    let mut queued = 0;
    let mut skipped = 0;
    for submission in submissions {
        let receipt = submission.await.unwrap().unwrap();
        queued += receipt.queued;
        skipped += receipt.skipped;
    }
    assert_eq!(queued, 6);
    assert_eq!(skipped, 6);
    assert!(wait_until(|| harness.manager.idle(), Duration::from_secs(2)).await);

    assert_eq!(harness.vendor.calls.load(Ordering::SeqCst), 6);
    let records = harness.store.payloads().unwrap();
    assert_eq!(records.len(), 6);
    assert!(records.iter().all(|r| r.status == Status::Succeeded));
}
