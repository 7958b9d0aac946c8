//! Public API for the adapter layer

pub use crate::adapter::error::{AdapterError, AdapterResult};
pub use crate::adapter::memory::{MemoryAdapterFactory, MemoryBroker};
pub use crate::adapter::traits::{
    AdapterFactory, AdapterKind, AdapterState, Consumer, MessageHandler, Producer, Remoter,
    StateCell,
};
