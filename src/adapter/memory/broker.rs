//! Topic/subscription broker with delayed redelivery

use crate::adapter::error::{AdapterError, AdapterResult};
use crate::core::sync::{handle_mutex_poison, handle_rwlock_read, handle_rwlock_write};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Upper bound on one idle wait, so delayed redeliveries are noticed
const VISIBILITY_POLL: Duration = Duration::from_millis(50);

fn internal(message: String) -> AdapterError {
    AdapterError::Internal { message }
}

#[derive(Debug)]
struct Envelope {
    id: String,
    tag: String,
    body: String,
    born_at: i64,
}

#[derive(Debug)]
struct Delivery {
    envelope: Arc<Envelope>,
    dequeue: u32,
    visible_at: Instant,
}

#[derive(Debug)]
struct Subscription {
    filter_tag: RwLock<String>,
    queue: Mutex<VecDeque<Delivery>>,
    ready: Notify,
}

impl Subscription {
    fn push(&self, delivery: Delivery) -> AdapterResult<()> {
        handle_mutex_poison(self.queue.lock(), internal)?.push_back(delivery);
        self.ready.notify_one();
        Ok(())
    }

    /// Remove the first visible delivery, counting the receipt
    fn take_visible(&self) -> AdapterResult<Option<Delivery>> {
        let mut queue = handle_mutex_poison(self.queue.lock(), internal)?;
        let now = Instant::now();
        Ok(queue
            .iter()
            .position(|d| d.visible_at <= now)
            .and_then(|pos| queue.remove(pos))
            .map(|mut delivery| {
                delivery.dequeue += 1;
                delivery
            }))
    }
}

#[derive(Debug, Default)]
struct Topic {
    subscriptions: RwLock<HashMap<String, Arc<Subscription>>>,
}

/// One message handed to a consumer
#[derive(Debug)]
pub struct ReceivedMessage {
    envelope: Arc<Envelope>,
    pub dequeue: u32,
}

impl ReceivedMessage {
    pub fn message_id(&self) -> &str {
        &self.envelope.id
    }

    pub fn tag(&self) -> &str {
        &self.envelope.tag
    }

    pub fn body(&self) -> &str {
        &self.envelope.body
    }

    /// Publish time, epoch milliseconds
    pub fn born_at(&self) -> i64 {
        self.envelope.born_at
    }
}

#[derive(Debug, Default)]
pub struct MemoryBroker {
    topics: RwLock<HashMap<String, Arc<Topic>>>,
    next_id: AtomicU64,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn topic(&self, name: &str) -> AdapterResult<Arc<Topic>> {
        handle_rwlock_read(self.topics.read(), internal)?
            .get(&name.to_uppercase())
            .cloned()
            .ok_or_else(|| AdapterError::TopicNotFound {
                topic: name.to_string(),
            })
    }

    fn subscription(&self, topic: &str, name: &str) -> AdapterResult<Arc<Subscription>> {
        let topic_ref = self.topic(topic)?;
        let subscriptions = handle_rwlock_read(topic_ref.subscriptions.read(), internal)?;
        subscriptions
            .get(name)
            .cloned()
            .ok_or_else(|| AdapterError::SubscriptionNotFound {
                topic: topic.to_string(),
                subscription: name.to_string(),
            })
    }

    pub fn has_topic(&self, name: &str) -> bool {
        self.topic(name).is_ok()
    }

    /// Returns `true` when the topic was created
    pub fn create_topic(&self, name: &str) -> AdapterResult<bool> {
        let mut topics = handle_rwlock_write(self.topics.write(), internal)?;
        let key = name.to_uppercase();
        if topics.contains_key(&key) {
            return Ok(false);
        }
        topics.insert(key, Arc::new(Topic::default()));
        Ok(true)
    }

    /// Live filter tag of a subscription, if it exists
    pub fn subscription_filter(&self, topic: &str, name: &str) -> AdapterResult<Option<String>> {
        match self.subscription(topic, name) {
            Ok(subscription) => Ok(Some(
                handle_rwlock_read(subscription.filter_tag.read(), internal)?.clone(),
            )),
            Err(AdapterError::SubscriptionNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create the subscription or change its filter. Pending messages of an
    /// existing subscription are kept.
    pub fn upsert_subscription(&self, topic: &str, name: &str, filter_tag: &str) -> AdapterResult<()> {
        let topic_ref = self.topic(topic)?;
        let mut subscriptions = handle_rwlock_write(topic_ref.subscriptions.write(), internal)?;
        match subscriptions.get(name) {
            Some(existing) => {
                *handle_rwlock_write(existing.filter_tag.write(), internal)? = filter_tag.to_string();
            }
            None => {
                subscriptions.insert(
                    name.to_string(),
                    Arc::new(Subscription {
                        filter_tag: RwLock::new(filter_tag.to_string()),
                        queue: Mutex::new(VecDeque::new()),
                        ready: Notify::new(),
                    }),
                );
            }
        }
        Ok(())
    }

    /// Fan a message out to every subscription filtering on `tag`
    pub fn publish(&self, topic: &str, tag: &str, body: &str) -> AdapterResult<String> {
        let topic_ref = self.topic(topic)?;
        let seq = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let envelope = Arc::new(Envelope {
            id: format!("MEM-{:012X}", seq),
            tag: tag.to_string(),
            body: body.to_string(),
            born_at: chrono::Utc::now().timestamp_millis(),
        });

        let subscriptions = handle_rwlock_read(topic_ref.subscriptions.read(), internal)?;
        for subscription in subscriptions.values() {
            let matches = handle_rwlock_read(subscription.filter_tag.read(), internal)?
                .eq_ignore_ascii_case(tag);
            if matches {
                subscription.push(Delivery {
                    envelope: envelope.clone(),
                    dequeue: 0,
                    visible_at: Instant::now(),
                })?;
            }
        }
        Ok(envelope.id.clone())
    }

    /// Wait up to `wait` for a visible message
    pub async fn receive(
        &self,
        topic: &str,
        name: &str,
        wait: Duration,
    ) -> AdapterResult<Option<ReceivedMessage>> {
        let subscription = self.subscription(topic, name)?;
        let deadline = Instant::now() + wait;

        loop {
            if let Some(delivery) = subscription.take_visible()? {
                return Ok(Some(ReceivedMessage {
                    envelope: delivery.envelope,
                    dequeue: delivery.dequeue,
                }));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let nap = (deadline - now).min(VISIBILITY_POLL);
            let _ = tokio::time::timeout(nap, subscription.ready.notified()).await;
        }
    }

    /// Make a received message visible again after `delay`
    pub fn redeliver(
        &self,
        topic: &str,
        name: &str,
        received: ReceivedMessage,
        delay: Duration,
    ) -> AdapterResult<()> {
        self.subscription(topic, name)?.push(Delivery {
            envelope: received.envelope,
            dequeue: received.dequeue,
            visible_at: Instant::now() + delay,
        })
    }

    /// Messages pending on a subscription, visible or delayed
    pub fn depth(&self, topic: &str, name: &str) -> usize {
        self.subscription(topic, name)
            .ok()
            .and_then(|s| s.queue.lock().ok().map(|q| q.len()))
            .unwrap_or(0)
    }
}
