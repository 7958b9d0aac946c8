//! Persisted record shapes
//!
//! These double as the `[[registries]]`/`[[tasks]]` seed format of the
//! configuration file, hence the serde defaults.

use crate::model::status::Status;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryRecord {
    pub id: u64,
    pub topic_name: String,
    pub topic_tag: String,
    #[serde(default)]
    pub filter_tag: Option<String>,
}

/// One handler slot; an empty `dispatcher_kind` means the slot is unused
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriberRecord {
    pub condition_kind: String,
    pub condition_params: serde_json::Value,
    pub dispatcher_kind: String,
    pub dispatcher_params: serde_json::Value,
    pub result_kind: String,
    pub result_params: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskRecord {
    pub id: u64,
    pub title: String,
    pub enabled: bool,
    pub registry_id: u64,
    pub updated: i64,
    pub parallels: Option<u32>,
    pub concurrency: Option<u32>,
    pub max_retry: Option<u32>,
    pub delay_seconds: Option<u64>,
    pub broadcasting: bool,
    pub subscriber: SubscriberRecord,
    pub subscriber_failed: SubscriberRecord,
    pub subscriber_succeed: SubscriberRecord,
}

impl Default for TaskRecord {
    fn default() -> Self {
        Self {
            id: 0,
            title: String::new(),
            enabled: true,
            registry_id: 0,
            updated: 0,
            parallels: None,
            concurrency: None,
            max_retry: None,
            delay_seconds: None,
            broadcasting: false,
            subscriber: SubscriberRecord::default(),
            subscriber_failed: SubscriberRecord::default(),
            subscriber_succeed: SubscriberRecord::default(),
        }
    }
}

/// Unique on (message_id, task_id)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: u64,
    pub message_id: String,
    pub task_id: u64,
    pub dequeue: u32,
    pub message_body: String,
    pub message_time: i64,
    pub payload_message_id: Option<String>,
    pub status: Status,
    pub error: Option<String>,
    pub response_body: Option<String>,
    pub duration_ms: u64,
}

/// Unique on (hash, offset) when `hash` is set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayloadRecord {
    pub id: u64,
    pub hash: String,
    pub offset: u32,
    pub registry_id: u64,
    pub topic_name: String,
    pub topic_tag: String,
    pub filter_tag: String,
    pub message_body: String,
    pub dequeue: u32,
    pub status: Status,
    pub error: Option<String>,
    pub message_id: Option<String>,
    pub duration_ms: u64,
}
