//! Retry Error Types

use crate::store::api::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    #[error("Retry sweep aborted: {0}")]
    Store(#[from] StoreError),
}

impl crate::core::error_handling::ContextualError for RetryError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}

pub type RetryResult<T> = Result<T, RetryError>;
