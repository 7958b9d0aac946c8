//! ConsumeExecutor: per-message dispatch state machine

use crate::adapter::api::MessageHandler;
use crate::cache::api::MemoryCache;
use crate::consumer::error::ConsumeError;
use crate::consumer::notifier::Notifier;
use crate::core::config::{Config, PersistConfig};
use crate::core::error_handling::{log_recoverable, panic_message};
use crate::core::sync::InFlightGuard;
use crate::model::message::Message;
use crate::model::notification::Notification;
use crate::model::payload::Payload;
use crate::model::pool::Pool;
use crate::model::status::Status;
use crate::model::task::Task;
use crate::producer::api::ProducerManager;
use crate::store::api::Store;
use crate::subscriber::api::{DispatchError, DispatchResult, Subscriber};
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Result of [`ConsumeExecutor::execute`]
#[derive(Debug, Default)]
pub struct ConsumeOutcome {
    /// The vendor should redeliver the message
    pub retry: bool,
    /// Filtered out by the subscriber's condition
    pub ignored: bool,
    pub error: Option<ConsumeError>,
}

impl ConsumeOutcome {
    pub fn is_illegal(&self) -> bool {
        matches!(self.error, Some(ConsumeError::Illegal { .. }))
    }
}

/// Run a synchronous pipeline stage, turning a panic into an error
fn guarded<T>(stage: impl FnOnce() -> DispatchResult<T>) -> DispatchResult<T> {
    std::panic::catch_unwind(AssertUnwindSafe(stage)).unwrap_or_else(|panic| {
        Err(DispatchError::Panicked {
            message: panic_message(&*panic),
        })
    })
}

pub struct ConsumeExecutor {
    cache: Arc<MemoryCache>,
    store: Arc<dyn Store>,
    messages: Arc<Pool<Message>>,
    persist: PersistConfig,
    notifier: Notifier,
    consuming: Arc<AtomicUsize>,
    releasing: Arc<AtomicUsize>,
}

impl ConsumeExecutor {
    pub fn new(
        cache: Arc<MemoryCache>,
        store: Arc<dyn Store>,
        messages: Arc<Pool<Message>>,
        payloads: Arc<Pool<Payload>>,
        producer: ProducerManager,
        config: &Config,
    ) -> Self {
        Self {
            notifier: Notifier::new(
                cache.clone(),
                producer,
                payloads,
                config.consumer.notify_concurrency,
            ),
            cache,
            store,
            messages,
            persist: config.persist.clone(),
            consuming: Arc::new(AtomicUsize::new(0)),
            releasing: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Drive one message to an outcome, then persist and release it
    pub async fn execute(&self, task: Arc<Task>, mut message: Message) -> ConsumeOutcome {
        let _consuming = InFlightGuard::enter(&self.consuming);
        let outcome = self.run(&task, &mut message).await;
        self.finish(&task, message, &outcome).await;
        outcome
    }

    /// No message is being consumed, notified or released
    pub fn idle(&self) -> bool {
        self.consuming.load(Ordering::Acquire) == 0
            && self.releasing.load(Ordering::Acquire) == 0
            && self.notifier.in_flight() == 0
    }

    async fn run(&self, task: &Arc<Task>, message: &mut Message) -> ConsumeOutcome {
        let (source, subscriber) = match self.resolve(task, message) {
            Ok(resolved) => resolved,
            Err(error) => {
                log::error!("{}", error);
                message.error = Some(error.to_string());
                return ConsumeOutcome {
                    error: Some(error),
                    ..ConsumeOutcome::default()
                };
            }
        };

        if let Some(condition) = subscriber.condition() {
            match guarded(|| Ok(condition.satisfied(message))) {
                Ok(true) => {}
                Ok(false) => {
                    log::debug!(
                        "Task {}: message {} filtered by {} condition",
                        task.id,
                        message.message_id,
                        condition.kind().as_ref()
                    );
                    message.ignored = true;
                    return ConsumeOutcome {
                        ignored: true,
                        ..ConsumeOutcome::default()
                    };
                }
                Err(error) => return self.failed(task, message, error),
            }
        }

        let started = Instant::now();
        let dispatched = AssertUnwindSafe(subscriber.dispatcher().dispatch(task, &source, message))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(DispatchError::Panicked {
                    message: panic_message(&*panic),
                })
            });
        message.duration = started.elapsed();
        if let Err(error) = &dispatched {
            message.response_body = error.response_body().map(str::to_string);
        }

        let validated = dispatched.and_then(|body| {
            let checked = match subscriber.result() {
                Some(result) => guarded(|| result.validate(&body)),
                None => Ok(()),
            };
            message.response_body = Some(body);
            checked
        });

        match validated {
            Ok(()) => ConsumeOutcome::default(),
            Err(error) => self.failed(task, message, error),
        }
    }

    fn failed(&self, task: &Task, message: &mut Message, error: DispatchError) -> ConsumeOutcome {
        message.error = Some(error.to_string());
        ConsumeOutcome {
            retry: message.dequeue < task.max_retry,
            ignored: false,
            error: Some(error.into()),
        }
    }

    /// Pick the subscriber and source task for `message`
    ///
    /// Notification tasks unwrap the envelope and deliver through the
    /// source task's failed/succeed slot; every other task uses its own
    /// subscriber.
    fn resolve(
        &self,
        task: &Arc<Task>,
        message: &mut Message,
    ) -> Result<(Arc<Task>, Arc<Subscriber>), ConsumeError> {
        let illegal = |reason: String| ConsumeError::Illegal {
            task_id: task.id,
            reason,
        };

        if !task.is_notification() {
            let subscriber = task
                .subscribers
                .normal
                .clone()
                .ok_or_else(|| illegal("task has no subscriber".to_string()))?;
            message.dispatcher_body.clear();
            message.dispatcher_body.push_str(&message.message_body);
            return Ok((task.clone(), subscriber));
        }

        let notification = Notification::decode(&message.message_body)
            .map_err(|e| illegal(format!("undecodable notification: {}", e)))?;
        let source = self
            .cache
            .task(notification.task_id)
            .ok_or_else(|| illegal(format!("source task {} not loaded", notification.task_id)))?;
        let (slot, route) = if task.is_notification_failed() {
            (source.subscribers.failed.clone(), "failed")
        } else {
            (source.subscribers.succeed.clone(), "succeed")
        };
        let subscriber = slot.ok_or_else(|| {
            illegal(format!(
                "source task {} has no {} subscriber",
                source.id, route
            ))
        })?;

        message.dispatcher_body = notification.message_body;
        Ok((source, subscriber))
    }

    async fn finish(&self, task: &Task, mut message: Message, outcome: &ConsumeOutcome) {
        let _releasing = InFlightGuard::enter(&self.releasing);

        if outcome.retry {
            log::warn!(
                "Task {}: message {} failed on delivery {}/{}, retrying: {}",
                task.id,
                message.message_id,
                message.dequeue,
                task.max_retry,
                message.error.as_deref().unwrap_or_default()
            );
            // The broker redelivers live messages; replays go back to the sweep
            if message.record_id.is_some() {
                message.dequeue += 1;
                self.persist(&message, Status::Waiting, true).await;
            }
        } else {
            let failed = outcome.error.is_some();
            let notify = !outcome.ignored
                && !outcome.is_illegal()
                && !task.is_notification()
                && if failed {
                    task.is_subscriber_failed()
                } else {
                    task.is_subscriber_succeed()
                };
            if notify {
                self.notifier.submit(task, &message, failed).await;
            }

            if failed && !outcome.is_illegal() {
                log::warn!(
                    "Task {}: message {} failed after {} deliveries: {}",
                    task.id,
                    message.message_id,
                    message.dequeue,
                    message.error.as_deref().unwrap_or_default()
                );
            }
            let (status, wanted) = if outcome.ignored {
                (Status::Succeeded, self.persist.message_ignored)
            } else if failed {
                (Status::Failed, self.persist.message_failed)
            } else {
                (Status::Succeeded, self.persist.message_succeeded)
            };
            self.persist(&message, status, wanted).await;
        }

        self.messages.release(message);
    }

    /// Replayed messages always update their record; live ones are
    /// inserted only when the outcome is configured for persistence.
    async fn persist(&self, message: &Message, status: Status, wanted: bool) {
        let saved = if message.record_id.is_some() {
            self.store.update_message(message.to_record(status)).await
        } else if wanted {
            self.store
                .save_message(message.to_record(status))
                .await
                .map(|_| ())
        } else {
            Ok(())
        };
        if let Err(e) = saved {
            log_recoverable(&e, "Persisting message outcome");
        }
    }
}

#[async_trait]
impl MessageHandler for ConsumeExecutor {
    async fn handle(&self, task: Arc<Task>, message: Message) -> bool {
        self.execute(task, message).await.retry
    }
}
