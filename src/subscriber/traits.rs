//! Subscriber capability traits

use crate::model::message::Message;
use crate::model::task::Task;
use crate::subscriber::error::DispatchResult;
use crate::subscriber::kinds::{ConditionKind, DispatcherKind, ResultKind};
use async_trait::async_trait;

/// Decides whether a message should be delivered at all
pub trait Condition: Send + Sync {
    fn kind(&self) -> ConditionKind;

    /// `false` marks the message ignored
    fn satisfied(&self, message: &Message) -> bool;
}

/// Delivers a message to the subscriber endpoint
#[async_trait]
pub trait Dispatcher: Send + Sync {
    fn kind(&self) -> DispatcherKind;

    /// `task` is the consuming task; `source` is the task whose message is
    /// delivered (differs only for notification tasks). Returns the raw
    /// response body.
    async fn dispatch(&self, task: &Task, source: &Task, message: &Message)
        -> DispatchResult<String>;
}

/// Inspects a successful response for application-level failure
pub trait ResultValidator: Send + Sync {
    fn kind(&self) -> ResultKind;

    fn validate(&self, response_body: &str) -> DispatchResult<()>;
}
