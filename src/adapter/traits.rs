//! The three vendor roles and their factory

use crate::adapter::error::AdapterResult;
use crate::model::message::Message;
use crate::model::payload::Payload;
use crate::model::registry::Registry;
use crate::model::task::Task;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Deserialize)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum AdapterKind {
    #[default]
    Memory,
}

/// Health of a vendor role. Only `Ready` accepts work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum AdapterState {
    Starting = 0,
    Ready = 1,
    Restarting = 2,
    Stopping = 3,
    Stopped = 4,
}

/// Lock-free holder for an [`AdapterState`]
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: AdapterState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn get(&self) -> AdapterState {
        match self.0.load(Ordering::Acquire) {
            0 => AdapterState::Starting,
            1 => AdapterState::Ready,
            2 => AdapterState::Restarting,
            3 => AdapterState::Stopping,
            _ => AdapterState::Stopped,
        }
    }

    pub fn set(&self, state: AdapterState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Per-message callback injected into consumers. Takes ownership of the
/// message and returns whether the vendor should redeliver it.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, task: Arc<Task>, message: Message) -> bool;
}

/// Receive loop for one task × parallel slot
#[async_trait]
pub trait Consumer: Send + Sync {
    /// `"<task>.<parallel>"`
    fn key(&self) -> &str;

    fn state(&self) -> AdapterState;

    async fn start(&self) -> AdapterResult<()>;

    /// Stop receiving and wait for in-flight handlers to return
    async fn stop(&self) -> AdapterResult<()>;
}

#[async_trait]
pub trait Producer: Send + Sync {
    fn state(&self) -> AdapterState;

    async fn start(&self) -> AdapterResult<()>;

    /// Publish one payload, returning the vendor message id
    async fn publish(&self, payload: &Payload) -> AdapterResult<String>;

    async fn stop(&self) -> AdapterResult<()>;
}

/// Idempotent provisioning. Each call returns whether anything changed.
#[async_trait]
pub trait Remoter: Send + Sync {
    async fn ensure_topic(&self, registry: &Registry) -> AdapterResult<bool>;

    async fn ensure_subscription(&self, task: &Task, parallel: u32) -> AdapterResult<bool>;
}

pub trait AdapterFactory: Send + Sync {
    fn kind(&self) -> AdapterKind;

    fn consumer(
        &self,
        task: Arc<Task>,
        parallel: u32,
        handler: Arc<dyn MessageHandler>,
    ) -> AdapterResult<Arc<dyn Consumer>>;

    /// The shared producer instance
    fn producer(&self) -> Arc<dyn Producer>;

    fn remoter(&self) -> Arc<dyn Remoter>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_state_cell_round_trip() {
        let cell = StateCell::new(AdapterState::Starting);
        assert_eq!(cell.get(), AdapterState::Starting);
        for state in [
            AdapterState::Ready,
            AdapterState::Restarting,
            AdapterState::Stopping,
            AdapterState::Stopped,
        ] {
            cell.set(state);
            assert_eq!(cell.get(), state);
        }
        assert_eq!(AdapterState::Restarting.to_string(), "restarting");
    }

    #[test]
    fn test_adapter_kind_names() {
        assert_eq!(AdapterKind::from_str("MEMORY").unwrap(), AdapterKind::Memory);
        assert!(AdapterKind::from_str("rocketmq").is_err());
    }
}
