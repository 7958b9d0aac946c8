//! Receive loop for one task × parallel slot

use crate::adapter::error::{AdapterError, AdapterResult};
use crate::adapter::memory::broker::{MemoryBroker, ReceivedMessage};
use crate::adapter::traits::{AdapterState, Consumer, MessageHandler, StateCell};
use crate::model::message::Message;
use crate::model::pool::Pool;
use crate::model::task::Task;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex, Semaphore};
use tokio::task::JoinHandle;

/// How long one receive call waits before re-checking for stop
const RECEIVE_WAIT: Duration = Duration::from_millis(200);

struct Shared {
    task: Arc<Task>,
    subscription: String,
    broker: Arc<MemoryBroker>,
    handler: Arc<dyn MessageHandler>,
    messages: Arc<Pool<Message>>,
    slots: Arc<Semaphore>,
}

impl Shared {
    async fn deliver(&self, received: ReceivedMessage) {
        let mut message = self.messages.acquire();
        message.dequeue = received.dequeue;
        message.message_id.push_str(received.message_id());
        message.message_body.push_str(received.body());
        message.message_time = received.born_at();
        message.task_id = self.task.id;
        // The memory broker hands every subscriber the publisher's id
        message.payload_message_id = Some(received.message_id().to_string());

        let retry = self.handler.handle(self.task.clone(), message).await;
        if retry {
            let delay = Duration::from_secs(self.task.delay_seconds);
            if let Err(e) = self.broker.redeliver(
                self.task.topic_name(),
                &self.subscription,
                received,
                delay,
            ) {
                log::error!("Task {}: cannot schedule redelivery: {}", self.task.id, e);
            }
        }
    }
}

async fn receive_loop(shared: Arc<Shared>, key: String, mut stop_rx: oneshot::Receiver<()>) {
    log::debug!("Consumer {} receiving from {}", key, shared.subscription);
    loop {
        let permit = tokio::select! {
            _ = &mut stop_rx => break,
            permit = shared.slots.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let received = tokio::select! {
            _ = &mut stop_rx => break,
            received = shared.broker.receive(
                shared.task.topic_name(),
                &shared.subscription,
                RECEIVE_WAIT,
            ) => received,
        };

        match received {
            Ok(Some(received)) => {
                let shared = shared.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    shared.deliver(received).await;
                });
            }
            Ok(None) => {}
            Err(e) => {
                log::warn!("Consumer {} receive failed: {}", key, e);
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = tokio::time::sleep(RECEIVE_WAIT) => {}
                }
            }
        }
    }
    log::debug!("Consumer {} receive loop exited", key);
}

/// Consumer for the memory broker. Up to `task.concurrency` messages are
/// handled at once.
pub struct MemoryConsumer {
    key: String,
    concurrency: u32,
    shared: Arc<Shared>,
    state: StateCell,
    control: Mutex<Option<(oneshot::Sender<()>, JoinHandle<()>)>>,
}

impl MemoryConsumer {
    pub fn new(
        task: Arc<Task>,
        parallel: u32,
        broker: Arc<MemoryBroker>,
        handler: Arc<dyn MessageHandler>,
        messages: Arc<Pool<Message>>,
    ) -> Self {
        let concurrency = task.concurrency.max(1);
        Self {
            key: task.consumer_key(parallel),
            concurrency,
            shared: Arc::new(Shared {
                subscription: task.subscription_name(parallel),
                task,
                broker,
                handler,
                messages,
                slots: Arc::new(Semaphore::new(concurrency as usize)),
            }),
            state: StateCell::new(AdapterState::Stopped),
            control: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Consumer for MemoryConsumer {
    fn key(&self) -> &str {
        &self.key
    }

    fn state(&self) -> AdapterState {
        self.state.get()
    }

    async fn start(&self) -> AdapterResult<()> {
        let mut control = self.control.lock().await;
        if control.is_some() {
            return Ok(());
        }
        self.state.set(AdapterState::Starting);

        // Fail fast when the subscription was never provisioned
        if self
            .shared
            .broker
            .subscription_filter(self.shared.task.topic_name(), &self.shared.subscription)?
            .is_none()
        {
            self.state.set(AdapterState::Stopped);
            return Err(AdapterError::SubscriptionNotFound {
                topic: self.shared.task.topic_name().to_string(),
                subscription: self.shared.subscription.clone(),
            });
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(receive_loop(self.shared.clone(), self.key.clone(), stop_rx));
        *control = Some((stop_tx, handle));
        self.state.set(AdapterState::Ready);
        Ok(())
    }

    async fn stop(&self) -> AdapterResult<()> {
        let Some((stop_tx, handle)) = self.control.lock().await.take() else {
            return Ok(());
        };
        self.state.set(AdapterState::Stopping);

        let _ = stop_tx.send(());
        if let Err(e) = handle.await {
            log::warn!("Consumer {} receive loop ended abnormally: {}", self.key, e);
        }

        // Every permit back means no handler is still running
        let drained = self
            .shared
            .slots
            .acquire_many(self.concurrency)
            .await
            .map_err(|e| AdapterError::Internal {
                message: e.to_string(),
            })?;
        drop(drained);

        self.state.set(AdapterState::Stopped);
        log::debug!("Consumer {} stopped", self.key);
        Ok(())
    }
}
