//! Inbound work unit

use crate::model::pool::Poolable;
use crate::model::status::Status;
use crate::store::api::MessageRecord;
use std::time::Duration;

/// A unit received from the broker, or replayed from the store
#[derive(Debug, Default)]
pub struct Message {
    /// Set when the message was replayed from a persisted record
    pub record_id: Option<u64>,
    /// Delivery count, 1 on first receipt
    pub dequeue: u32,
    pub message_body: String,
    /// Body handed to the dispatcher; the unwrapped body for notifications
    pub dispatcher_body: String,
    pub message_id: String,
    /// Broker timestamp, epoch milliseconds
    pub message_time: i64,
    pub task_id: u64,
    /// Id the vendor returned to the publisher of this body
    pub payload_message_id: Option<String>,

    pub error: Option<String>,
    pub ignored: bool,
    pub duration: Duration,
    pub response_body: Option<String>,
}

impl Poolable for Message {
    fn reset(&mut self) {
        self.record_id = None;
        self.dequeue = 0;
        self.message_body.clear();
        self.dispatcher_body.clear();
        self.message_id.clear();
        self.message_time = 0;
        self.task_id = 0;
        self.payload_message_id = None;
        self.error = None;
        self.ignored = false;
        self.duration = Duration::ZERO;
        self.response_body = None;
    }
}

impl Message {
    /// Populate from a persisted record for replay
    pub fn load_record(&mut self, record: &MessageRecord) {
        self.record_id = Some(record.id);
        self.dequeue = record.dequeue;
        self.message_body.push_str(&record.message_body);
        self.message_id.push_str(&record.message_id);
        self.message_time = record.message_time;
        self.task_id = record.task_id;
        self.payload_message_id = record.payload_message_id.clone();
    }

    pub fn to_record(&self, status: Status) -> MessageRecord {
        MessageRecord {
            id: self.record_id.unwrap_or_default(),
            message_id: self.message_id.clone(),
            task_id: self.task_id,
            dequeue: self.dequeue,
            message_body: self.message_body.clone(),
            message_time: self.message_time,
            payload_message_id: self.payload_message_id.clone(),
            status,
            error: self.error.clone(),
            response_body: self.response_body.clone(),
            duration_ms: self.duration.as_millis() as u64,
        }
    }
}
