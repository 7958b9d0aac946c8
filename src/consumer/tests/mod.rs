//! Consume pipeline and reconciliation suites
//!
//! [`Rig`] is shared with the retry suite: an in-memory context with the
//! orders registry, both reserved notification pairs and a started
//! producer.


use crate::app::context::{AppContext, MemoryHandles};
use crate::consumer::api::ConsumeExecutor;
use crate::core::config::{Config, PersistConfig};
use crate::core::controller::Controller;
use crate::model::message::Message;
use crate::model::task::Task;
use crate::producer::api::ProducerManager;
use crate::store::api::{RegistryRecord, SubscriberRecord, TaskRecord};
use serde_json::json;
use std::sync::Arc;

pub(crate) const ORDERS: u64 = 1;
pub(crate) const NOTIFY_FAILED: u64 = 2;
pub(crate) const NOTIFY_SUCCEED: u64 = 3;

fn registry(id: u64, topic_name: &str, topic_tag: &str) -> RegistryRecord {
    RegistryRecord {
        id,
        topic_name: topic_name.into(),
        topic_tag: topic_tag.into(),
        filter_tag: None,
    }
}

pub(crate) fn registries() -> Vec<RegistryRecord> {
    vec![
        registry(ORDERS, "orders", "created"),
        registry(NOTIFY_FAILED, "QUEUEHOOK_NOTIFICATION", "FAILED"),
        registry(NOTIFY_SUCCEED, "queuehook_notification", "succeed"),
    ]
}

/// HTTP subscriber judging responses by `errno`
pub(crate) fn http_subscriber(url: &str) -> SubscriberRecord {
    SubscriberRecord {
        dispatcher_kind: "http".into(),
        dispatcher_params: json!({ "url": url }),
        result_kind: "errno".into(),
        ..SubscriberRecord::default()
    }
}

pub(crate) fn task(id: u64, registry_id: u64, subscriber: SubscriberRecord) -> TaskRecord {
    TaskRecord {
        id,
        title: format!("task {}", id),
        registry_id,
        max_retry: Some(3),
        delay_seconds: Some(0),
        subscriber,
        ..TaskRecord::default()
    }
}

/// Every outcome persisted, so tests can read results back from the store
pub(crate) fn config(tasks: Vec<TaskRecord>) -> Config {
    Config {
        persist: PersistConfig {
            message_succeeded: true,
            message_failed: true,
            message_ignored: true,
            payload_succeeded: true,
            payload_failed: true,
        },
        registries: registries(),
        tasks,
        ..Config::default()
    }
}

pub(crate) struct Rig {
    pub context: AppContext,
    pub handles: MemoryHandles,
    pub producer: ProducerManager,
    pub executor: Arc<ConsumeExecutor>,
}

impl Rig {
    pub async fn new(tasks: Vec<TaskRecord>) -> Self {
        Self::with_config(config(tasks)).await
    }

    pub async fn with_config(config: Config) -> Self {
        let (context, handles) = AppContext::in_memory(config).unwrap();
        context.cache.reload().await.unwrap();

        let remoter = context.adapter.remoter();
        let snapshot = context.cache.snapshot();
        for registry in snapshot.registries() {
            remoter.ensure_topic(registry).await.unwrap();
        }

        let producer = context.producer_manager();
        producer.start().await.unwrap();
        let executor = Arc::new(context.consume_executor(producer.clone()));
        Self {
            context,
            handles,
            producer,
            executor,
        }
    }

    pub fn task(&self, id: u64) -> Arc<Task> {
        self.context.cache.task(id).unwrap()
    }

    /// A live message as a consumer would hand it over
    pub fn message(&self, message_id: &str, task_id: u64, body: &str, dequeue: u32) -> Message {
        let mut message = self.context.messages.acquire();
        message.message_id.push_str(message_id);
        message.message_body.push_str(body);
        message.task_id = task_id;
        message.dequeue = dequeue;
        message
    }
}
