//! Public API for the consumer side

pub use crate::consumer::error::{ConsumeError, ConsumerError, ConsumerResult};
pub use crate::consumer::executor::{ConsumeExecutor, ConsumeOutcome};
pub use crate::consumer::manager::{ConsumerManager, ReconcileReport};
