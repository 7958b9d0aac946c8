//! Retry sweeps over the in-memory store

use crate::consumer::tests::{http_subscriber, task, Rig, ORDERS};
use crate::core::config::RetryConfig;
use crate::core::shutdown::wait_until;
use crate::model::status::Status;
use crate::retry::api::{RetryManager, SweepReport};
use crate::store::api::{
    InMemoryStore, MessageRecord, PayloadRecord, RegistryRecord, Store, StoreResult, TaskRecord,
};
use crate::subscriber::tests::support::HttpStub;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Store whose listing can be held back, or raced by "another instance"
/// that claims every listed row before the sweep gets to it
struct ContendedStore {
    inner: Arc<InMemoryStore>,
    steal: AtomicBool,
    listing: AtomicUsize,
    gate: Option<Semaphore>,
}

impl ContendedStore {
    fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            steal: AtomicBool::new(false),
            listing: AtomicUsize::new(0),
            gate: None,
        }
    }

    fn gated(inner: Arc<InMemoryStore>) -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new(inner)
        }
    }

    fn open(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1 << 16);
        }
    }
}

#[async_trait]
impl Store for ContendedStore {
    async fn list_enabled_tasks(&self) -> StoreResult<Vec<TaskRecord>> {
        self.inner.list_enabled_tasks().await
    }
    async fn list_all_registries(&self) -> StoreResult<Vec<RegistryRecord>> {
        self.inner.list_all_registries().await
    }
    async fn save_message(&self, record: MessageRecord) -> StoreResult<u64> {
        self.inner.save_message(record).await
    }
    async fn update_message(&self, record: MessageRecord) -> StoreResult<()> {
        self.inner.update_message(record).await
    }
    async fn find_message(&self, id: &str, task: u64) -> StoreResult<Option<MessageRecord>> {
        self.inner.find_message(id, task).await
    }
    async fn list_waiting_messages(&self, a: u64, l: usize) -> StoreResult<Vec<MessageRecord>> {
        self.listing.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.unwrap();
        }
        let listed = self.inner.list_waiting_messages(a, l).await?;
        if self.steal.load(Ordering::SeqCst) {
            for record in &listed {
                self.inner
                    .transition_message(record.id, Status::Waiting, Status::Processing)
                    .await?;
            }
        }
        Ok(listed)
    }
    async fn transition_message(&self, id: u64, f: Status, t: Status) -> StoreResult<u64> {
        self.inner.transition_message(id, f, t).await
    }
    async fn save_payload(&self, record: PayloadRecord) -> StoreResult<u64> {
        self.inner.save_payload(record).await
    }

    async fn insert_payload(&self, record: PayloadRecord) -> StoreResult<Option<u64>> {
        self.inner.insert_payload(record).await
    }
    async fn update_payload(&self, record: PayloadRecord) -> StoreResult<()> {
        self.inner.update_payload(record).await
    }
    async fn find_payload(&self, h: &str, o: u32) -> StoreResult<Option<PayloadRecord>> {
        self.inner.find_payload(h, o).await
    }
    async fn list_waiting_payloads(&self, a: u64, l: usize) -> StoreResult<Vec<PayloadRecord>> {
        self.inner.list_waiting_payloads(a, l).await
    }
    async fn transition_payload(&self, id: u64, f: Status, t: Status) -> StoreResult<u64> {
        self.inner.transition_payload(id, f, t).await
    }
}

fn retry_manager(rig: &Rig, store: Arc<dyn Store>, batch_size: usize) -> RetryManager {
    RetryManager::new(
        store,
        rig.context.cache.clone(),
        rig.executor.clone(),
        rig.producer.clone(),
        rig.context.messages.clone(),
        rig.context.payloads.clone(),
        &RetryConfig {
            batch_size,
            ..RetryConfig::default()
        },
    )
}

fn waiting_message(message_id: &str, task_id: u64, dequeue: u32) -> MessageRecord {
    MessageRecord {
        message_id: message_id.into(),
        task_id,
        dequeue,
        message_body: format!(r#"{{"id":"{}"}}"#, message_id),
        status: Status::Waiting,
        ..MessageRecord::default()
    }
}

async fn seed(rig: &Rig, records: Vec<MessageRecord>) -> Vec<u64> {
    let mut ids = Vec::new();
    for record in records {
        ids.push(rig.context.store.save_message(record).await.unwrap());
    }
    ids
}

#[tokio::test]
async fn test_sweep_replays_every_waiting_message() {
    let stub = HttpStub::start(200, r#"{"errno":0}"#).await;
    let rig = Rig::new(vec![task(7, ORDERS, http_subscriber(&stub.url))]).await;
    let ids = seed(
        &rig,
        vec![
            waiting_message("M-1", 7, 1),
            waiting_message("M-2", 7, 1),
            waiting_message("M-3", 7, 1),
        ],
    )
    .await;

    // Smaller batches than backlog: the sweep keeps paging
    let retry = retry_manager(&rig, rig.context.store.clone(), 2);
    let report = retry.sweep_messages().await.unwrap().unwrap();
    assert_eq!(
        report,
        SweepReport {
            claimed: 3,
            ..SweepReport::default()
        }
    );

    assert_eq!(stub.requests().len(), 3);
    for id in ids {
        let record = rig.handles.store.message(id).unwrap().unwrap();
        assert_eq!(record.status, Status::Succeeded);
        assert_eq!(record.dequeue, 1);
    }
}

#[tokio::test]
async fn test_failed_replay_returns_to_waiting_then_fails() {
    let stub = HttpStub::start(200, r#"{"errno":2}"#).await;
    let rig = Rig::new(vec![task(7, ORDERS, http_subscriber(&stub.url))]).await;
    let ids = seed(&rig, vec![waiting_message("M-1", 7, 2)]).await;
    let retry = retry_manager(&rig, rig.context.store.clone(), 10);

    retry.sweep_messages().await.unwrap().unwrap();
    let record = rig.handles.store.message(ids[0]).unwrap().unwrap();
    assert_eq!(record.status, Status::Waiting);
    assert_eq!(record.dequeue, 3);

    retry.sweep_messages().await.unwrap().unwrap();
    let record = rig.handles.store.message(ids[0]).unwrap().unwrap();
    assert_eq!(record.status, Status::Failed);
    assert_eq!(record.dequeue, 3);
    assert_eq!(stub.requests().len(), 2);
}

#[tokio::test]
async fn test_rows_claimed_elsewhere_are_skipped() {
    let stub = HttpStub::start(200, r#"{"errno":0}"#).await;
    let rig = Rig::new(vec![task(7, ORDERS, http_subscriber(&stub.url))]).await;
    let ids = seed(
        &rig,
        vec![waiting_message("M-1", 7, 1), waiting_message("M-2", 7, 1)],
    )
    .await;

    let store = Arc::new(ContendedStore::new(rig.handles.store.clone()));
    store.steal.store(true, Ordering::SeqCst);
    let retry = retry_manager(&rig, store, 10);

    let report = retry.sweep_messages().await.unwrap().unwrap();
    assert_eq!(report.conflicts, 2);
    assert_eq!(report.claimed, 0);
    assert!(stub.requests().is_empty());
    for id in ids {
        let record = rig.handles.store.message(id).unwrap().unwrap();
        assert_eq!(record.status, Status::Processing);
    }
}

#[tokio::test]
async fn test_record_of_unloaded_task_is_abandoned() {
    let rig = Rig::new(vec![]).await;
    let ids = seed(&rig, vec![waiting_message("M-1", 42, 1)]).await;
    let retry = retry_manager(&rig, rig.context.store.clone(), 10);

    let report = retry.sweep_messages().await.unwrap().unwrap();
    assert_eq!(report.abandoned, 1);
    assert_eq!(report.claimed, 0);

    let record = rig.handles.store.message(ids[0]).unwrap().unwrap();
    assert_eq!(record.status, Status::Failed);
    assert_eq!(record.error.as_deref(), Some("task 42 is not loaded"));
}

#[tokio::test]
async fn test_payload_sweep_resends() {
    let rig = Rig::new(vec![]).await;
    let id = rig
        .context
        .store
        .save_payload(PayloadRecord {
            registry_id: ORDERS,
            topic_name: "orders".into(),
            topic_tag: "created".into(),
            filter_tag: "T1".into(),
            message_body: "{}".into(),
            dequeue: 1,
            status: Status::Waiting,
            ..PayloadRecord::default()
        })
        .await
        .unwrap();
    let retry = retry_manager(&rig, rig.context.store.clone(), 10);

    let report = retry.sweep_payloads().await.unwrap().unwrap();
    assert_eq!(report.claimed, 1);

    let record = rig.handles.store.payload(id).unwrap().unwrap();
    assert_eq!(record.status, Status::Succeeded);
    assert_eq!(record.dequeue, 2);
    assert!(record.message_id.is_some());
}

#[tokio::test]
async fn test_overlapping_sweep_is_refused() {
    let stub = HttpStub::start(200, r#"{"errno":0}"#).await;
    let rig = Rig::new(vec![task(7, ORDERS, http_subscriber(&stub.url))]).await;
    seed(&rig, vec![waiting_message("M-1", 7, 1)]).await;

    let store = Arc::new(ContendedStore::gated(rig.handles.store.clone()));
    let retry = retry_manager(&rig, store.clone(), 10);

    let first = {
        let retry = retry.clone();
        tokio::spawn(async move { retry.sweep_messages().await })
    };
    assert!(
        wait_until(
            || store.listing.load(Ordering::SeqCst) == 1,
            Duration::from_secs(2)
        )
        .await
    );

    assert!(retry.sweep_messages().await.unwrap().is_none());
    // The payload sweep has its own guard
    assert!(retry.sweep_payloads().await.unwrap().is_some());

    store.open();
    let report = first.await.unwrap().unwrap().unwrap();
    assert_eq!(report.claimed, 1);
    assert!(retry.sweep_messages().await.unwrap().is_some());
}
