//! Explicit application context
//!
//! Built once at startup and passed by reference into every manager
//! constructor. Nothing in the crate reaches for process-wide state.

use crate::adapter::api::{AdapterFactory, AdapterKind, MemoryAdapterFactory, MemoryBroker};
use crate::app::error::AppResult;
use crate::cache::api::MemoryCache;
use crate::consumer::api::ConsumeExecutor;
use crate::core::config::Config;
use crate::model::message::Message;
use crate::model::payload::Payload;
use crate::model::pool::Pool;
use crate::producer::api::ProducerManager;
use crate::store::api::{InMemoryStore, Store};
use crate::subscriber::api::SubscriberFactory;
use std::sync::Arc;

/// Idle messages and payloads kept for reuse
const POOL_CAPACITY: usize = 1024;

pub struct AppContext {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub cache: Arc<MemoryCache>,
    pub adapter: Arc<dyn AdapterFactory>,
    pub messages: Arc<Pool<Message>>,
    pub payloads: Arc<Pool<Payload>>,
}

/// Concrete handles on the bundled in-process backends
pub struct MemoryHandles {
    pub store: Arc<InMemoryStore>,
    pub adapter: Arc<MemoryAdapterFactory>,
}

impl AppContext {
    /// Context for the configured adapter kind
    pub fn from_config(config: Config) -> AppResult<Self> {
        match config.adapter.kind {
            AdapterKind::Memory => Ok(Self::in_memory(config)?.0),
        }
    }

    /// Context over the in-memory store, seeded from the config's
    /// `[[registries]]` and `[[tasks]]`, and the in-process broker
    pub fn in_memory(config: Config) -> AppResult<(Self, MemoryHandles)> {
        config.validate()?;

        let messages = Arc::new(Pool::new(POOL_CAPACITY));
        let payloads = Arc::new(Pool::new(POOL_CAPACITY));
        let store = Arc::new(InMemoryStore::seeded(&config.registries, &config.tasks)?);
        let adapter = Arc::new(MemoryAdapterFactory::new(
            Arc::new(MemoryBroker::new()),
            messages.clone(),
        ));
        let cache = Arc::new(MemoryCache::new(
            store.clone(),
            SubscriberFactory::new()?,
            config.consumer.clone(),
            config.notification.clone(),
        ));

        let context = Self {
            config: Arc::new(config),
            store: store.clone(),
            cache,
            adapter: adapter.clone(),
            messages,
            payloads,
        };
        Ok((context, MemoryHandles { store, adapter }))
    }

    pub fn producer_manager(&self) -> ProducerManager {
        ProducerManager::new(
            self.adapter.producer(),
            self.store.clone(),
            self.payloads.clone(),
            self.config.producer.clone(),
            self.config.persist.clone(),
        )
    }

    pub fn consume_executor(&self, producer: ProducerManager) -> ConsumeExecutor {
        ConsumeExecutor::new(
            self.cache.clone(),
            self.store.clone(),
            self.messages.clone(),
            self.payloads.clone(),
            producer,
            &self.config,
        )
    }
}
