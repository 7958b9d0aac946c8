//! Bounded worker pool publishing delivery outcomes

use crate::cache::api::MemoryCache;
use crate::core::sync::InFlightGuard;
use crate::model::message::Message;
use crate::model::notification::Notification;
use crate::model::payload::Payload;
use crate::model::pool::Pool;
use crate::model::task::Task;
use crate::producer::api::ProducerManager;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

pub(crate) struct Notifier {
    cache: Arc<MemoryCache>,
    producer: ProducerManager,
    payloads: Arc<Pool<Payload>>,
    slots: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
}

impl Notifier {
    pub fn new(
        cache: Arc<MemoryCache>,
        producer: ProducerManager,
        payloads: Arc<Pool<Payload>>,
        width: usize,
    ) -> Self {
        Self {
            cache,
            producer,
            payloads,
            slots: Arc::new(Semaphore::new(width.max(1))),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Hand the outcome of `message` to a worker. Waits only for a free
    /// worker slot, never for the broker.
    pub async fn submit(&self, task: &Task, message: &Message, failed: bool) {
        let config = self.cache.notification();
        let tag = if failed {
            &config.tag_failed
        } else {
            &config.tag_succeed
        };
        let Some(registry) = self.cache.registry_by_names(&config.topic, tag) else {
            log::warn!(
                "Notification pair {}:{} is not registered; dropping outcome of {} for task {}",
                config.topic,
                tag,
                message.message_id,
                task.id
            );
            return;
        };

        let body = match Notification::for_message(task.id, message).encode() {
            Ok(body) => body,
            Err(e) => {
                log::error!("Task {}: cannot encode notification: {}", task.id, e);
                return;
            }
        };

        let guard = InFlightGuard::enter(&self.in_flight);
        let Ok(permit) = self.slots.clone().acquire_owned().await else {
            return;
        };
        let mut payload = self.payloads.acquire();
        payload.bind(&registry, &body);

        let producer = self.producer.clone();
        let task_id = task.id;
        let message_id = message.message_id.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let _guard = guard;
            match producer.publish_sync(payload).await {
                Ok(id) => log::debug!("Task {}: outcome of {} sent as {}", task_id, message_id, id),
                Err(e) => log::warn!(
                    "Task {}: outcome of {} not published: {}",
                    task_id,
                    message_id,
                    e
                ),
            }
        });
    }
}
