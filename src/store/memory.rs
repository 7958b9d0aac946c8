//! In-memory store
//!
//! Backs the binary when no relational store is wired in, and every test.
//! All operations run under one `RwLock`, which makes the conditional
//! status transitions atomic in the same way a single-row `UPDATE ... WHERE
//! status = ?` is.

use crate::core::sync::{handle_rwlock_read, handle_rwlock_write};
use crate::model::status::Status;
use crate::store::error::{StoreError, StoreResult};
use crate::store::traits::Store;
use crate::store::types::{MessageRecord, PayloadRecord, RegistryRecord, TaskRecord};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct StoreState {
    registries: BTreeMap<u64, RegistryRecord>,
    tasks: BTreeMap<u64, TaskRecord>,
    messages: BTreeMap<u64, MessageRecord>,
    payloads: BTreeMap<u64, PayloadRecord>,
    next_message_id: u64,
    next_payload_id: u64,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with registry and task rows
    pub fn seeded(registries: &[RegistryRecord], tasks: &[TaskRecord]) -> StoreResult<Self> {
        let store = Self::new();
        for registry in registries {
            store.upsert_registry(registry.clone())?;
        }
        for task in tasks {
            store.upsert_task(task.clone())?;
        }
        Ok(store)
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        handle_rwlock_read(self.state.read(), |message| StoreError::Internal { message })
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        handle_rwlock_write(self.state.write(), |message| StoreError::Internal { message })
    }

    pub fn upsert_registry(&self, record: RegistryRecord) -> StoreResult<()> {
        let mut state = self.write()?;
        state.registries.insert(record.id, record);
        Ok(())
    }

    /// Insert or replace a task. The version stamp is bumped past the stored
    /// one so every persisted change is visible to reconciliation.
    pub fn upsert_task(&self, mut record: TaskRecord) -> StoreResult<()> {
        let mut state = self.write()?;
        if let Some(existing) = state.tasks.get(&record.id) {
            if record.updated <= existing.updated {
                record.updated = existing.updated + 1;
            }
        }
        state.tasks.insert(record.id, record);
        Ok(())
    }

    pub fn remove_task(&self, id: u64) -> StoreResult<Option<TaskRecord>> {
        Ok(self.write()?.tasks.remove(&id))
    }

    pub fn task(&self, id: u64) -> StoreResult<Option<TaskRecord>> {
        Ok(self.read()?.tasks.get(&id).cloned())
    }

    pub fn message(&self, id: u64) -> StoreResult<Option<MessageRecord>> {
        Ok(self.read()?.messages.get(&id).cloned())
    }

    pub fn messages(&self) -> StoreResult<Vec<MessageRecord>> {
        Ok(self.read()?.messages.values().cloned().collect())
    }

    pub fn payload(&self, id: u64) -> StoreResult<Option<PayloadRecord>> {
        Ok(self.read()?.payloads.get(&id).cloned())
    }

    pub fn payloads(&self) -> StoreResult<Vec<PayloadRecord>> {
        Ok(self.read()?.payloads.values().cloned().collect())
    }
}

fn transition<R>(
    rows: &mut BTreeMap<u64, R>,
    id: u64,
    from: Status,
    to: Status,
    status: fn(&mut R) -> &mut Status,
) -> u64 {
    if let Some(row) = rows.get_mut(&id) {
        let current = status(row);
        if *current == from {
            *current = to;
            return 1;
        }
    }
    0
}

#[async_trait]
impl Store for InMemoryStore {
    async fn list_enabled_tasks(&self) -> StoreResult<Vec<TaskRecord>> {
        Ok(self
            .read()?
            .tasks
            .values()
            .filter(|t| t.enabled)
            .cloned()
            .collect())
    }

    async fn list_all_registries(&self) -> StoreResult<Vec<RegistryRecord>> {
        Ok(self.read()?.registries.values().cloned().collect())
    }

    async fn save_message(&self, mut record: MessageRecord) -> StoreResult<u64> {
        let mut state = self.write()?;
        let existing = state
            .messages
            .values()
            .find(|m| m.message_id == record.message_id && m.task_id == record.task_id)
            .map(|m| m.id);

        let id = match existing {
            Some(id) => id,
            None => {
                state.next_message_id += 1;
                state.next_message_id
            }
        };
        record.id = id;
        state.messages.insert(id, record);
        Ok(id)
    }

    async fn update_message(&self, record: MessageRecord) -> StoreResult<()> {
        let mut state = self.write()?;
        match state.messages.get_mut(&record.id) {
            Some(row) => {
                *row = record;
                Ok(())
            }
            None => Err(StoreError::NotFound {
                kind: "message",
                id: record.id,
            }),
        }
    }

    async fn find_message(
        &self,
        message_id: &str,
        task_id: u64,
    ) -> StoreResult<Option<MessageRecord>> {
        Ok(self
            .read()?
            .messages
            .values()
            .find(|m| m.message_id == message_id && m.task_id == task_id)
            .cloned())
    }

    async fn list_waiting_messages(
        &self,
        after_id: u64,
        limit: usize,
    ) -> StoreResult<Vec<MessageRecord>> {
        Ok(self
            .read()?
            .messages
            .range(after_id + 1..)
            .map(|(_, m)| m)
            .filter(|m| m.status == Status::Waiting)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn transition_message(&self, id: u64, from: Status, to: Status) -> StoreResult<u64> {
        let mut state = self.write()?;
        Ok(transition(&mut state.messages, id, from, to, |m| {
            &mut m.status
        }))
    }

    async fn save_payload(&self, mut record: PayloadRecord) -> StoreResult<u64> {
        let mut state = self.write()?;
        let existing = if record.hash.is_empty() {
            None
        } else {
            state
                .payloads
                .values()
                .find(|p| p.hash == record.hash && p.offset == record.offset)
                .map(|p| p.id)
        };

        let id = match existing {
            Some(id) => id,
            None => {
                state.next_payload_id += 1;
                state.next_payload_id
            }
        };
        record.id = id;
        state.payloads.insert(id, record);
        Ok(id)
    }

    async fn insert_payload(&self, mut record: PayloadRecord) -> StoreResult<Option<u64>> {
        let mut state = self.write()?;
        let taken = state
            .payloads
            .values()
            .any(|p| p.hash == record.hash && p.offset == record.offset);
        if taken {
            return Ok(None);
        }

        state.next_payload_id += 1;
        record.id = state.next_payload_id;
        state.payloads.insert(record.id, record);
        Ok(Some(state.next_payload_id))
    }

    async fn update_payload(&self, record: PayloadRecord) -> StoreResult<()> {
        let mut state = self.write()?;
        match state.payloads.get_mut(&record.id) {
            Some(row) => {
                *row = record;
                Ok(())
            }
            None => Err(StoreError::NotFound {
                kind: "payload",
                id: record.id,
            }),
        }
    }

    async fn find_payload(&self, hash: &str, offset: u32) -> StoreResult<Option<PayloadRecord>> {
        Ok(self
            .read()?
            .payloads
            .values()
            .find(|p| p.hash == hash && p.offset == offset)
            .cloned())
    }

    async fn list_waiting_payloads(
        &self,
        after_id: u64,
        limit: usize,
    ) -> StoreResult<Vec<PayloadRecord>> {
        Ok(self
            .read()?
            .payloads
            .range(after_id + 1..)
            .map(|(_, p)| p)
            .filter(|p| p.status == Status::Waiting)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn transition_payload(&self, id: u64, from: Status, to: Status) -> StoreResult<u64> {
        let mut state = self.write()?;
        Ok(transition(&mut state.payloads, id, from, to, |p| {
            &mut p.status
        }))
    }
}
