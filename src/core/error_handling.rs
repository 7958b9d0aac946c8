//! Generic error handling utilities
//!
//! Every subsystem error implements [`ContextualError`] so that the binary
//! and the long-running managers can log failures uniformly: configuration
//! mistakes show their own message, runtime failures show the operation
//! context with the detail at debug level.

/// Trait for errors that can distinguish between user-actionable and system errors
///
/// When `is_user_actionable()` returns `true`, `user_message()` must return
/// `Some(message)`; otherwise it returns `None`.
pub trait ContextualError: std::error::Error {
    /// True when the error carries a message the operator can act on
    /// directly (bad config value, unknown subscriber kind).
    fn is_user_actionable(&self) -> bool;

    /// The operator-facing message for user-actionable errors
    fn user_message(&self) -> Option<&str>;
}

/// Log a fatal error with appropriate detail level based on error specificity
///
/// # Examples
/// ```rust,no_run
/// # use queuehook::core::error_handling::log_error_with_context;
/// # use queuehook::core::config::ConfigError;
/// let err = ConfigError::Invalid { message: "producer.concurrency must be > 0".into() };
/// log_error_with_context(&err, "Configuration loading");
/// // Logs: "FATAL: producer.concurrency must be > 0"
/// ```
pub fn log_error_with_context<E: ContextualError + std::fmt::Display + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => log::error!("FATAL: {}", user_msg),
        _ => log::error!("FATAL: {}", operation_context),
    }
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}

/// Log a non-fatal failure of a background operation
///
/// Managers keep running after these; the line is a warning with the
/// operation name and the error rendered once.
pub fn log_recoverable<E: ContextualError + std::fmt::Display>(error: &E, operation_context: &str) {
    if error.is_user_actionable() {
        log::warn!(
            "{}: {}",
            operation_context,
            error.user_message().unwrap_or_default()
        );
    } else {
        log::warn!("{} failed: {}", operation_context, error);
    }
}

/// Render a caught panic payload as text
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
