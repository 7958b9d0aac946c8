//! Shared producer for the memory broker

use crate::adapter::error::{AdapterError, AdapterResult};
use crate::adapter::memory::broker::MemoryBroker;
use crate::adapter::traits::{AdapterState, Producer, StateCell};
use crate::model::payload::Payload;
use async_trait::async_trait;
use std::sync::Arc;

pub struct MemoryProducer {
    broker: Arc<MemoryBroker>,
    state: StateCell,
}

impl MemoryProducer {
    pub fn new(broker: Arc<MemoryBroker>) -> Self {
        Self {
            broker,
            state: StateCell::new(AdapterState::Stopped),
        }
    }

    /// Force a health state, e.g. to simulate a vendor reconnect
    pub fn set_state(&self, state: AdapterState) {
        self.state.set(state);
    }
}

#[async_trait]
impl Producer for MemoryProducer {
    fn state(&self) -> AdapterState {
        self.state.get()
    }

    async fn start(&self) -> AdapterResult<()> {
        self.state.set(AdapterState::Ready);
        Ok(())
    }

    async fn publish(&self, payload: &Payload) -> AdapterResult<String> {
        let state = self.state.get();
        if state != AdapterState::Ready {
            return Err(AdapterError::NotReady { state });
        }
        self.broker
            .publish(&payload.topic_name, &payload.filter_tag, &payload.message_body)
    }

    async fn stop(&self) -> AdapterResult<()> {
        self.state.set(AdapterState::Stopped);
        Ok(())
    }
}
