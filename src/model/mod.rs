//! Data model shared by every subsystem
//!
//! Registries and tasks are immutable snapshot values, rebuilt wholesale on
//! every cache reload. Messages and payloads are mutable work units that
//! cycle through a [`pool::Pool`]: acquired, populated, driven through the
//! pipeline, persisted, then reset and returned.

pub mod api;
pub mod message;
pub mod notification;
pub mod payload;
pub mod pool;
pub mod registry;
pub mod status;
pub mod task;
