//! Producer Error Types

use crate::adapter::api::{AdapterError, AdapterState};
use crate::store::api::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    #[error("Bucket is full (capacity: {capacity})")]
    BucketFull { capacity: usize },

    #[error("Adapter producer is {state}, refusing to send")]
    AdapterNotHealthy { state: AdapterState },

    #[error("Producer is stopping")]
    Stopped,

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Internal producer error: {message}")]
    Internal { message: String },
}

impl crate::core::error_handling::ContextualError for ProducerError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}

pub type ProducerResult<T> = Result<T, ProducerError>;
