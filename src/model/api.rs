//! Public API for the data model

pub use crate::model::message::Message;
pub use crate::model::notification::Notification;
pub use crate::model::payload::Payload;
pub use crate::model::pool::{Pool, Poolable};
pub use crate::model::registry::{registry_key, Registry};
pub use crate::model::status::Status;
pub use crate::model::task::{Task, TaskSubscribers};
