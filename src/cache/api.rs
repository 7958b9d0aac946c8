//! Public API for the snapshot cache

pub use crate::cache::error::{CacheError, CacheResult};
pub use crate::cache::memory::MemoryCache;
pub use crate::cache::snapshot::{Snapshot, SnapshotAssembler};
