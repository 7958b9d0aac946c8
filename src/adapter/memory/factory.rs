//! Factory wiring the memory vendor roles to one broker

use crate::adapter::error::AdapterResult;
use crate::adapter::memory::{MemoryBroker, MemoryConsumer, MemoryProducer, MemoryRemoter};
use crate::adapter::traits::{AdapterFactory, AdapterKind, Consumer, MessageHandler, Producer, Remoter};
use crate::model::message::Message;
use crate::model::pool::Pool;
use crate::model::task::Task;
use std::sync::Arc;

pub struct MemoryAdapterFactory {
    broker: Arc<MemoryBroker>,
    messages: Arc<Pool<Message>>,
    producer: Arc<MemoryProducer>,
    remoter: Arc<MemoryRemoter>,
}

impl MemoryAdapterFactory {
    pub fn new(broker: Arc<MemoryBroker>, messages: Arc<Pool<Message>>) -> Self {
        Self {
            producer: Arc::new(MemoryProducer::new(broker.clone())),
            remoter: Arc::new(MemoryRemoter::new(broker.clone())),
            broker,
            messages,
        }
    }

    pub fn broker(&self) -> &Arc<MemoryBroker> {
        &self.broker
    }

    /// Concrete handle on the shared producer
    pub fn memory_producer(&self) -> &Arc<MemoryProducer> {
        &self.producer
    }
}

impl AdapterFactory for MemoryAdapterFactory {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Memory
    }

    fn consumer(
        &self,
        task: Arc<Task>,
        parallel: u32,
        handler: Arc<dyn MessageHandler>,
    ) -> AdapterResult<Arc<dyn Consumer>> {
        Ok(Arc::new(MemoryConsumer::new(
            task,
            parallel,
            self.broker.clone(),
            handler,
            self.messages.clone(),
        )))
    }

    fn producer(&self) -> Arc<dyn Producer> {
        self.producer.clone()
    }

    fn remoter(&self) -> Arc<dyn Remoter> {
        self.remoter.clone()
    }
}
