//! Provisioning against the memory broker

use crate::adapter::error::AdapterResult;
use crate::adapter::memory::broker::MemoryBroker;
use crate::adapter::traits::Remoter;
use crate::model::registry::Registry;
use crate::model::task::Task;
use async_trait::async_trait;
use std::sync::Arc;

pub struct MemoryRemoter {
    broker: Arc<MemoryBroker>,
}

impl MemoryRemoter {
    pub fn new(broker: Arc<MemoryBroker>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl Remoter for MemoryRemoter {
    async fn ensure_topic(&self, registry: &Registry) -> AdapterResult<bool> {
        let created = self.broker.create_topic(&registry.topic_name)?;
        if created {
            log::info!("Created topic {}", registry.topic_name.to_uppercase());
        }
        Ok(created)
    }

    async fn ensure_subscription(&self, task: &Task, parallel: u32) -> AdapterResult<bool> {
        let name = task.subscription_name(parallel);
        let live = self.broker.subscription_filter(task.topic_name(), &name)?;
        if live.as_deref() == Some(task.filter_tag()) {
            return Ok(false);
        }

        self.broker
            .upsert_subscription(task.topic_name(), &name, task.filter_tag())?;
        log::info!(
            "Subscription {}/{} now filters on {}",
            task.topic_name(),
            name,
            task.filter_tag()
        );
        Ok(true)
    }
}
