//! Public API for the persistence layer

pub use crate::store::error::{StoreError, StoreResult};
pub use crate::store::memory::InMemoryStore;
pub use crate::store::traits::Store;
pub use crate::store::types::{
    MessageRecord, PayloadRecord, RegistryRecord, SubscriberRecord, TaskRecord,
};
