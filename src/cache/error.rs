//! Cache Error Types

use crate::store::api::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Snapshot reload failed: {0}")]
    Store(#[from] StoreError),
}

impl crate::core::error_handling::ContextualError for CacheError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
