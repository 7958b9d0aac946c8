//! Subscriber Error Types

/// Failure to build a subscriber slot from its persisted description
#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error("Unknown {capability} kind '{kind}'")]
    UnknownKind {
        capability: &'static str,
        kind: String,
    },

    #[error("Invalid parameters for '{kind}': {message}")]
    InvalidParams { kind: String, message: String },

    #[error("Cannot create HTTP client: {message}")]
    Client { message: String },
}

impl crate::core::error_handling::ContextualError for SubscriberError {
    fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            SubscriberError::UnknownKind { .. } | SubscriberError::InvalidParams { .. }
        )
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            SubscriberError::InvalidParams { message, .. } => Some(message),
            _ => None,
        }
    }
}

pub type SubscriberResult<T> = Result<T, SubscriberError>;

/// Failure of one delivery attempt; always eligible for retry
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    /// Network failure, timeout or non-2xx status. `body` holds whatever
    /// the endpoint answered with a failing status.
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        body: Option<String>,
    },

    /// The endpoint answered but reported failure
    #[error("Business error: {message}")]
    Business { message: String },

    #[error("Dispatch panicked: {message}")]
    Panicked { message: String },
}

impl crate::core::error_handling::ContextualError for DispatchError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}

impl DispatchError {
    /// Response body that came back with the failure, if any
    pub fn response_body(&self) -> Option<&str> {
        match self {
            DispatchError::Transport { body, .. } => body.as_deref(),
            _ => None,
        }
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;
