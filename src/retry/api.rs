//! Public API for retry sweeps

pub use crate::retry::error::{RetryError, RetryResult};
pub use crate::retry::manager::{RetryManager, SweepReport};
