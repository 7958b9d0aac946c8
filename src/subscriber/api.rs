//! Public API for the subscriber pipeline

pub use crate::subscriber::bundle::Subscriber;
pub use crate::subscriber::error::{
    DispatchError, DispatchResult, SubscriberError, SubscriberResult,
};
pub use crate::subscriber::factory::SubscriberFactory;
pub use crate::subscriber::kinds::{ConditionKind, DispatcherKind, ResultKind};
pub use crate::subscriber::traits::{Condition, Dispatcher, ResultValidator};
