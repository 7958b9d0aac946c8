//! Consumer Error Types

use crate::adapter::api::AdapterError;
use crate::cache::api::CacheError;
use crate::subscriber::api::DispatchError;

/// Why a single message did not succeed
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConsumeError {
    /// No usable subscriber could be resolved. Never retried.
    #[error("Illegal message for task {task_id}: {reason}")]
    Illegal { task_id: u64, reason: String },

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl crate::core::error_handling::ContextualError for ConsumeError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, ConsumeError::Illegal { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ConsumeError::Illegal { reason, .. } => Some(reason),
            ConsumeError::Dispatch(_) => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("Internal consumer error: {message}")]
    Internal { message: String },
}

impl crate::core::error_handling::ContextualError for ConsumerError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}

pub type ConsumerResult<T> = Result<T, ConsumerError>;
