//! MemoryCache: periodically reloaded snapshot holder

use crate::cache::error::CacheResult;
use crate::cache::snapshot::{Snapshot, SnapshotAssembler};
use crate::core::config::{ConsumerConfig, NotificationConfig};
use crate::model::registry::Registry;
use crate::model::task::Task;
use crate::store::api::Store;
use crate::subscriber::api::SubscriberFactory;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

pub struct MemoryCache {
    store: Arc<dyn Store>,
    factory: SubscriberFactory,
    defaults: ConsumerConfig,
    notification: NotificationConfig,
    current: RwLock<Arc<Snapshot>>,
}

impl MemoryCache {
    pub fn new(
        store: Arc<dyn Store>,
        factory: SubscriberFactory,
        defaults: ConsumerConfig,
        notification: NotificationConfig,
    ) -> Self {
        Self {
            store,
            factory,
            defaults,
            notification,
            current: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    /// Rebuild the snapshot from the store. On failure the previous
    /// snapshot stays in place.
    pub async fn reload(&self) -> CacheResult<()> {
        let tasks = self.store.list_enabled_tasks().await?;
        let registries = self.store.list_all_registries().await?;

        let snapshot = SnapshotAssembler {
            factory: &self.factory,
            defaults: &self.defaults,
            notification: &self.notification,
        }
        .assemble(&registries, &tasks);

        log::debug!(
            "Snapshot reloaded: {} of {} tasks, {} registries",
            snapshot.tasks().len(),
            tasks.len(),
            registries.len()
        );
        self.install(snapshot);
        Ok(())
    }

    /// Swap in a snapshot built elsewhere
    pub fn install(&self, snapshot: Snapshot) {
        // A poisoned lock still holds a complete Arc; take it over
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = Arc::new(snapshot);
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn task(&self, id: u64) -> Option<Arc<Task>> {
        self.snapshot().task(id)
    }

    pub fn tasks(&self) -> HashMap<u64, Arc<Task>> {
        self.snapshot().tasks().clone()
    }

    pub fn registry(&self, id: u64) -> Option<Arc<Registry>> {
        self.snapshot().registry(id)
    }

    pub fn registry_by_names(&self, topic_name: &str, topic_tag: &str) -> Option<Arc<Registry>> {
        self.snapshot().registry_by_names(topic_name, topic_tag)
    }

    pub fn notification(&self) -> &NotificationConfig {
        &self.notification
    }
}
