//! Public API for the producer

pub use crate::producer::bucket::Bucket;
pub use crate::producer::error::{ProducerError, ProducerResult};
pub use crate::producer::manager::{batch_hash, BatchReceipt, ProducerManager};
