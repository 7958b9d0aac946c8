//! Store trait

use crate::model::status::Status;
use crate::store::error::StoreResult;
use crate::store::types::{MessageRecord, PayloadRecord, RegistryRecord, TaskRecord};
use async_trait::async_trait;

#[async_trait]
pub trait Store: Send + Sync {
    async fn list_enabled_tasks(&self) -> StoreResult<Vec<TaskRecord>>;

    async fn list_all_registries(&self) -> StoreResult<Vec<RegistryRecord>>;

    /// Insert, or overwrite the row with the same (message_id, task_id).
    /// Returns the row id.
    async fn save_message(&self, record: MessageRecord) -> StoreResult<u64>;

    /// Overwrite the row `record.id`
    async fn update_message(&self, record: MessageRecord) -> StoreResult<()>;

    async fn find_message(&self, message_id: &str, task_id: u64)
        -> StoreResult<Option<MessageRecord>>;

    /// Up to `limit` WAITING rows with id greater than `after_id`, by id
    async fn list_waiting_messages(
        &self,
        after_id: u64,
        limit: usize,
    ) -> StoreResult<Vec<MessageRecord>>;

    /// Conditional status change; returns the number of rows affected
    async fn transition_message(&self, id: u64, from: Status, to: Status) -> StoreResult<u64>;

    /// Insert, or overwrite the row with the same non-empty (hash, offset)
    async fn save_payload(&self, record: PayloadRecord) -> StoreResult<u64>;

    /// Insert unless a row with the same (hash, offset) already exists.
    /// Returns the new row id, or `None` when the key was taken.
    async fn insert_payload(&self, record: PayloadRecord) -> StoreResult<Option<u64>>;

    async fn update_payload(&self, record: PayloadRecord) -> StoreResult<()>;

    async fn find_payload(&self, hash: &str, offset: u32) -> StoreResult<Option<PayloadRecord>>;

    async fn list_waiting_payloads(
        &self,
        after_id: u64,
        limit: usize,
    ) -> StoreResult<Vec<PayloadRecord>>;

    async fn transition_payload(&self, id: u64, from: Status, to: Status) -> StoreResult<u64>;
}
