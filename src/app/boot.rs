//! Start and stop the managers in dependency order

use crate::app::context::AppContext;
use crate::app::error::AppResult;
use crate::consumer::api::ConsumerManager;
use crate::core::controller::{stop_with_timeout, Controller};
use crate::core::error_handling::log_recoverable;
use crate::producer::api::ProducerManager;
use crate::retry::api::RetryManager;
use std::sync::Arc;
use std::time::Duration;

/// Slack on top of a manager's own drain timeout before the stop is cut off
const STOP_GRACE: Duration = Duration::from_secs(5);

/// The three long-running managers wired over one context
pub struct Boot {
    pub producer: ProducerManager,
    pub consumers: ConsumerManager,
    pub retry: RetryManager,
    producer_timeout: Duration,
    consumer_timeout: Duration,
}

impl Boot {
    pub fn new(context: &AppContext) -> Self {
        let producer = context.producer_manager();
        let executor = Arc::new(context.consume_executor(producer.clone()));
        let consumers = ConsumerManager::new(
            context.cache.clone(),
            context.adapter.clone(),
            executor.clone(),
            &context.config,
        );
        let retry = RetryManager::new(
            context.store.clone(),
            context.cache.clone(),
            executor,
            producer.clone(),
            context.messages.clone(),
            context.payloads.clone(),
            &context.config.retry,
        );

        Self {
            producer,
            consumers,
            retry,
            producer_timeout: context.config.producer_shutdown_timeout(),
            consumer_timeout: context.config.consumer_shutdown_timeout(),
        }
    }

    /// Start order: producer (notifications need it), consumers, retry
    fn ordered(&self) -> [(&dyn Controller, Duration); 3] {
        [
            (&self.producer, self.producer_timeout),
            (&self.consumers, self.consumer_timeout),
            (&self.retry, self.consumer_timeout),
        ]
    }

    /// Start every manager. On failure the ones already running are
    /// stopped again.
    pub async fn start(&self) -> AppResult<()> {
        let ordered = self.ordered();
        for (index, (controller, _)) in ordered.iter().enumerate() {
            if let Err(e) = controller.start().await {
                for (started, timeout) in ordered[..index].iter().rev() {
                    if let Err(stop_error) = stop_with_timeout(*started, *timeout + STOP_GRACE).await {
                        log_recoverable(&stop_error, "Rolling back startup");
                    }
                }
                return Err(e.into());
            }
            log::debug!("Controller '{}' started", controller.name());
        }
        log::info!("All controllers started");
        Ok(())
    }

    /// Stop in reverse start order. Every manager gets its chance to drain
    /// even when an earlier one overran; the first failure is returned.
    pub async fn stop(&self) -> AppResult<()> {
        let mut first_error = None;
        for (controller, timeout) in self.ordered().iter().rev() {
            match stop_with_timeout(*controller, *timeout + STOP_GRACE).await {
                Ok(()) => log::debug!("Controller '{}' stopped", controller.name()),
                Err(e) => {
                    log_recoverable(&e, &format!("Stopping {}", controller.name()));
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => {
                log::info!("All controllers stopped");
                Ok(())
            }
        }
    }
}
