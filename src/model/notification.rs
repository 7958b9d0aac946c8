//! Delivery outcome envelope
//!
//! Serialised as the body of an ordinary payload published on the reserved
//! notification topic, then received again as an ordinary message and
//! decoded back to find the task whose outcome it reports.

use crate::model::message::Message;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub message_body: String,
    pub message_id: String,
    pub task_id: u64,
}

impl Notification {
    /// Outcome of `message` delivered for `task_id`
    pub fn for_message(task_id: u64, message: &Message) -> Self {
        Self {
            message_body: message.dispatcher_body.clone(),
            message_id: message.message_id.clone(),
            task_id,
        }
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn decode(body: &str) -> serde_json::Result<Self> {
        serde_json::from_str(body)
    }
}
