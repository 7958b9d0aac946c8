//! Adapter Error Types

use crate::adapter::traits::AdapterState;

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("Adapter is {state}, not ready")]
    NotReady { state: AdapterState },

    #[error("Topic not found: {topic}")]
    TopicNotFound { topic: String },

    #[error("Subscription not found: {topic}/{subscription}")]
    SubscriptionNotFound { topic: String, subscription: String },

    #[error("Vendor call failed: {message}")]
    Vendor { message: String },

    #[error("Vendor call panicked: {message}")]
    Panicked { message: String },

    #[error("Internal adapter error: {message}")]
    Internal { message: String },
}

impl crate::core::error_handling::ContextualError for AdapterError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;
