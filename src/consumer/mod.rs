//! Inbound side: the dispatch state machine and consumer reconciliation
//!
//! [`executor::ConsumeExecutor`] takes one message through
//! route → condition → dispatch → result → retry decision, persists the
//! outcome and emits delivery notifications. It is the
//! [`crate::adapter::api::MessageHandler`] bound to every vendor consumer.
//!
//! [`manager::ConsumerManager`] keeps exactly one running vendor consumer
//! per `(task, parallel)` slot of the current snapshot, restarting slots of
//! changed tasks and stopping slots that are no longer wanted.

pub mod api;
pub mod error;
pub mod executor;
pub mod manager;
mod notifier;

#[cfg(test)]
pub(crate) mod tests;
