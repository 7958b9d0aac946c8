//! Controller trait for subsystem coordination
//!
//! The consumer, producer and retry managers each run their own background
//! loops. They expose the same start/stop surface so the boot sequence can
//! start them in dependency order and stop them in reverse, each stop
//! bounded by a timeout.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// System coordination error types
#[derive(Error, Debug)]
pub enum SystemError {
    #[error("Component '{component}' failed to shutdown within {timeout:?}")]
    ShutdownTimeout {
        component: String,
        timeout: Duration,
    },

    #[error("Component '{component}' failed to start: {reason}")]
    StartFailed { component: String, reason: String },

    #[error("System coordination operation '{operation}' failed: {reason}")]
    CoordinationFailed { operation: String, reason: String },
}

impl crate::core::error_handling::ContextualError for SystemError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}

pub type SystemResult<T> = Result<T, SystemError>;

/// Trait for long-running subsystems managed by the boot sequence
#[async_trait]
pub trait Controller: Send + Sync {
    /// Stable component name used in logs and errors
    fn name(&self) -> &'static str;

    /// Spawn the subsystem's background loops. Must return promptly.
    async fn start(&self) -> SystemResult<()>;

    /// Stop accepting work and wait for in-flight work to drain
    async fn graceful_stop(&self) -> SystemResult<()>;
}

/// Stop a controller, converting an overrun into [`SystemError::ShutdownTimeout`]
pub async fn stop_with_timeout(controller: &dyn Controller, timeout: Duration) -> SystemResult<()> {
    match tokio::time::timeout(timeout, controller.graceful_stop()).await {
        Ok(result) => result,
        Err(_) => Err(SystemError::ShutdownTimeout {
            component: controller.name().to_string(),
            timeout,
        }),
    }
}
