//! Application Error Types

use crate::core::config::ConfigError;
use crate::core::controller::SystemError;
use crate::core::error_handling::ContextualError;
use crate::store::api::StoreError;
use crate::subscriber::api::SubscriberError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Subscriber(#[from] SubscriberError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    System(#[from] SystemError),

    #[error("Logging setup failed: {message}")]
    Logging { message: String },
}

impl ContextualError for AppError {
    fn is_user_actionable(&self) -> bool {
        match self {
            AppError::Config(e) => e.is_user_actionable(),
            AppError::Subscriber(e) => e.is_user_actionable(),
            AppError::Logging { .. } => true,
            AppError::Store(_) | AppError::System(_) => false,
        }
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            AppError::Config(e) => e.user_message(),
            AppError::Subscriber(e) => e.user_message(),
            AppError::Logging { message } => Some(message),
            AppError::Store(_) | AppError::System(_) => None,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
