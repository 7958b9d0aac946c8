//! Immutable task/registry snapshot and its assembly from store rows

use crate::core::config::{ConsumerConfig, NotificationConfig};
use crate::model::registry::{registry_key, Registry};
use crate::model::task::{Task, TaskSubscribers};
use crate::store::api::{RegistryRecord, TaskRecord};
use crate::subscriber::api::{SubscriberFactory, SubscriberResult};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One consistent view of all registries and enabled tasks
#[derive(Debug, Default)]
pub struct Snapshot {
    registries: HashMap<u64, Arc<Registry>>,
    registry_keys: HashMap<String, u64>,
    tasks: HashMap<u64, Arc<Task>>,
}

impl Snapshot {
    /// Build from already assembled values. The first registry wins on a
    /// duplicate key.
    pub fn new(registries: Vec<Arc<Registry>>, tasks: Vec<Task>) -> Self {
        let mut snapshot = Self::default();
        for registry in first_per_key(registries) {
            snapshot.registry_keys.insert(registry.key(), registry.id);
            snapshot.registries.insert(registry.id, registry);
        }
        snapshot.tasks = tasks.into_iter().map(|t| (t.id, Arc::new(t))).collect();
        snapshot
    }

    pub fn task(&self, id: u64) -> Option<Arc<Task>> {
        self.tasks.get(&id).cloned()
    }

    pub fn tasks(&self) -> &HashMap<u64, Arc<Task>> {
        &self.tasks
    }

    pub fn registry(&self, id: u64) -> Option<Arc<Registry>> {
        self.registries.get(&id).cloned()
    }

    pub fn registries(&self) -> impl Iterator<Item = &Arc<Registry>> {
        self.registries.values()
    }

    /// Case-insensitive lookup by (topic, tag)
    pub fn registry_by_names(&self, topic_name: &str, topic_tag: &str) -> Option<Arc<Registry>> {
        self.registry_keys
            .get(&registry_key(topic_name, topic_tag))
            .and_then(|id| self.registry(*id))
    }
}

/// Drop registries whose case-insensitive key repeats an earlier one
fn first_per_key(registries: Vec<Arc<Registry>>) -> Vec<Arc<Registry>> {
    let mut seen = HashSet::new();
    registries
        .into_iter()
        .filter(|registry| {
            let fresh = seen.insert(registry.key());
            if !fresh {
                log::warn!(
                    "Registry {} duplicates key {}; keeping the first",
                    registry.id,
                    registry.key()
                );
            }
            fresh
        })
        .collect()
}

/// Turns store rows into a [`Snapshot`]
pub struct SnapshotAssembler<'a> {
    pub factory: &'a SubscriberFactory,
    pub defaults: &'a ConsumerConfig,
    pub notification: &'a NotificationConfig,
}

impl SnapshotAssembler<'_> {
    /// Tasks whose registry is unknown or whose subscriber slots cannot be
    /// built are left out of the snapshot and logged; the rest still load.
    pub fn assemble(&self, registries: &[RegistryRecord], tasks: &[TaskRecord]) -> Snapshot {
        // Tasks may only bind registries that make it into the snapshot
        let registries = first_per_key(
            registries
                .iter()
                .map(|r| Arc::new(Registry::from_record(r)))
                .collect(),
        );
        let by_id: HashMap<u64, Arc<Registry>> =
            registries.iter().map(|r| (r.id, r.clone())).collect();

        let mut assembled = Vec::with_capacity(tasks.len());
        for record in tasks {
            let registry = match by_id.get(&record.registry_id) {
                Some(registry) => registry.clone(),
                None => {
                    log::error!(
                        "Task {} '{}' references unknown registry {}; excluded",
                        record.id,
                        record.title,
                        record.registry_id
                    );
                    continue;
                }
            };

            match self.subscribers(record) {
                Ok(subscribers) => assembled.push(Task::from_record(
                    record,
                    registry,
                    subscribers,
                    self.defaults,
                    self.notification,
                )),
                Err(e) => log::error!(
                    "Task {} '{}' has an unusable subscriber: {}; excluded",
                    record.id,
                    record.title,
                    e
                ),
            }
        }

        Snapshot::new(registries, assembled)
    }

    fn subscribers(&self, record: &TaskRecord) -> SubscriberResult<TaskSubscribers> {
        Ok(TaskSubscribers {
            normal: self.factory.build(&record.subscriber)?,
            failed: self.factory.build(&record.subscriber_failed)?,
            succeed: self.factory.build(&record.subscriber_succeed)?,
        })
    }
}
