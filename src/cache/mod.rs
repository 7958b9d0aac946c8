//! In-memory snapshot of tasks and registries
//!
//! [`memory::MemoryCache::reload`] reads everything from the store, builds a
//! brand-new [`snapshot::Snapshot`] and swaps it in under one write lock.
//! Readers clone the current `Arc<Snapshot>` and never see a half-built
//! map. A failed store read keeps the previous snapshot.

pub mod api;
pub mod error;
pub mod memory;
pub mod snapshot;
