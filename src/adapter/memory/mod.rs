//! In-process `memory` vendor
//!
//! [`broker::MemoryBroker`] keeps topics keyed by upper-cased name. Each
//! topic fans published messages out to the subscriptions whose filter tag
//! matches the message tag. Tasks that do not broadcast share one
//! subscription across their parallel slots (competing consumers);
//! broadcasting tasks get one subscription per slot. A message handed back
//! for retry becomes visible again after the task's delay, with its
//! dequeue count carried over.

pub mod broker;
pub mod consumer;
pub mod factory;
pub mod producer;
pub mod remoter;

pub use broker::MemoryBroker;
pub use consumer::MemoryConsumer;
pub use factory::MemoryAdapterFactory;
pub use producer::MemoryProducer;
pub use remoter::MemoryRemoter;
