//! Store Error Types

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found: {kind} {id}")]
    NotFound { kind: &'static str, id: u64 },

    #[error("Duplicate record: {message}")]
    Duplicate { message: String },

    #[error("Store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Internal store error: {message}")]
    Internal { message: String },
}

impl crate::core::error_handling::ContextualError for StoreError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
