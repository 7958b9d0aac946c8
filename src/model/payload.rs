//! Outbound work unit

use crate::model::pool::Poolable;
use crate::model::registry::Registry;
use crate::model::status::Status;
use crate::store::api::PayloadRecord;
use std::time::Duration;

/// A unit to be published to the broker
#[derive(Debug, Default)]
pub struct Payload {
    pub record_id: Option<u64>,
    /// Batch idempotency key: (hash, offset)
    pub hash: String,
    pub offset: u32,
    pub registry_id: u64,
    pub topic_name: String,
    pub topic_tag: String,
    pub filter_tag: String,
    pub message_body: String,
    /// Send attempts so far
    pub dequeue: u32,

    pub error: Option<String>,
    pub duration: Duration,
    pub message_id: Option<String>,
}

impl Poolable for Payload {
    fn reset(&mut self) {
        self.record_id = None;
        self.hash.clear();
        self.offset = 0;
        self.registry_id = 0;
        self.topic_name.clear();
        self.topic_tag.clear();
        self.filter_tag.clear();
        self.message_body.clear();
        self.dequeue = 0;
        self.error = None;
        self.duration = Duration::ZERO;
        self.message_id = None;
    }
}

impl Payload {
    /// Address the payload at `registry` with `body`
    pub fn bind(&mut self, registry: &Registry, body: &str) {
        self.registry_id = registry.id;
        self.topic_name.push_str(&registry.topic_name);
        self.topic_tag.push_str(&registry.topic_tag);
        self.filter_tag.push_str(&registry.filter_tag);
        self.message_body.push_str(body);
    }

    pub fn load_record(&mut self, record: &PayloadRecord) {
        self.record_id = Some(record.id);
        self.hash.push_str(&record.hash);
        self.offset = record.offset;
        self.registry_id = record.registry_id;
        self.topic_name.push_str(&record.topic_name);
        self.topic_tag.push_str(&record.topic_tag);
        self.filter_tag.push_str(&record.filter_tag);
        self.message_body.push_str(&record.message_body);
        self.dequeue = record.dequeue;
    }

    pub fn to_record(&self, status: Status) -> PayloadRecord {
        PayloadRecord {
            id: self.record_id.unwrap_or_default(),
            hash: self.hash.clone(),
            offset: self.offset,
            registry_id: self.registry_id,
            topic_name: self.topic_name.clone(),
            topic_tag: self.topic_tag.clone(),
            filter_tag: self.filter_tag.clone(),
            message_body: self.message_body.clone(),
            dequeue: self.dequeue,
            status,
            error: self.error.clone(),
            message_id: self.message_id.clone(),
            duration_ms: self.duration.as_millis() as u64,
        }
    }
}
