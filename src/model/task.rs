//! Subscription tasks

use crate::core::config::{ConsumerConfig, NotificationConfig};
use crate::model::registry::Registry;
use crate::store::api::TaskRecord;
use crate::subscriber::api::Subscriber;
use std::sync::Arc;

/// The three handler slots of a task
#[derive(Debug, Clone, Default)]
pub struct TaskSubscribers {
    pub normal: Option<Arc<Subscriber>>,
    pub failed: Option<Arc<Subscriber>>,
    pub succeed: Option<Arc<Subscriber>>,
}

/// A subscription binding one registry entry to up to three subscribers
#[derive(Debug, Clone)]
pub struct Task {
    pub id: u64,
    pub title: String,
    /// Version stamp; any change restarts the task's consumers
    pub updated: i64,
    pub parallels: u32,
    pub concurrency: u32,
    pub max_retry: u32,
    pub delay_seconds: u64,
    pub broadcasting: bool,
    pub registry: Arc<Registry>,
    pub subscribers: TaskSubscribers,
    notification_failed: bool,
    notification_succeed: bool,
}

impl Task {
    /// Assemble a task, filling unset knobs from the consumer defaults and
    /// deciding once whether it listens on a reserved notification pair.
    pub fn from_record(
        record: &TaskRecord,
        registry: Arc<Registry>,
        subscribers: TaskSubscribers,
        defaults: &ConsumerConfig,
        notification: &NotificationConfig,
    ) -> Self {
        let on_topic = registry
            .topic_name
            .eq_ignore_ascii_case(&notification.topic);
        let notification_failed =
            on_topic && registry.topic_tag.eq_ignore_ascii_case(&notification.tag_failed);
        let notification_succeed =
            on_topic && registry.topic_tag.eq_ignore_ascii_case(&notification.tag_succeed);

        Self {
            id: record.id,
            title: record.title.clone(),
            updated: record.updated,
            parallels: record.parallels.unwrap_or(defaults.parallels).max(1),
            concurrency: record.concurrency.unwrap_or(defaults.concurrency).max(1),
            max_retry: record.max_retry.unwrap_or(defaults.max_retry),
            delay_seconds: record.delay_seconds.unwrap_or(defaults.delay_seconds),
            broadcasting: record.broadcasting,
            registry,
            subscribers,
            notification_failed,
            notification_succeed,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.notification_failed || self.notification_succeed
    }

    pub fn is_notification_failed(&self) -> bool {
        self.notification_failed
    }

    pub fn is_notification_succeed(&self) -> bool {
        self.notification_succeed
    }

    pub fn is_subscriber_failed(&self) -> bool {
        self.subscribers.failed.is_some()
    }

    pub fn is_subscriber_succeed(&self) -> bool {
        self.subscribers.succeed.is_some()
    }

    pub fn topic_name(&self) -> &str {
        &self.registry.topic_name
    }

    pub fn topic_tag(&self) -> &str {
        &self.registry.topic_tag
    }

    pub fn filter_tag(&self) -> &str {
        &self.registry.filter_tag
    }

    /// Key of one consumer slot, `"<task>.<parallel>"`
    pub fn consumer_key(&self, parallel: u32) -> String {
        format!("{}.{}", self.id, parallel)
    }

    /// Broker subscription name. Broadcasting tasks get one subscription per
    /// slot so every slot sees every message; otherwise slots compete.
    pub fn subscription_name(&self, parallel: u32) -> String {
        if self.broadcasting {
            format!("task-{}-{}", self.id, parallel)
        } else {
            format!("task-{}", self.id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64) -> TaskRecord {
        TaskRecord {
            id,
            title: format!("task {}", id),
            registry_id: 1,
            ..TaskRecord::default()
        }
    }

    #[test]
    fn test_defaults_fill_unset_fields() {
        let defaults = ConsumerConfig::default();
        let task = Task::from_record(
            &record(1),
            Arc::new(Registry::new(1, "orders", "created")),
            TaskSubscribers::default(),
            &defaults,
            &NotificationConfig::default(),
        );

        assert_eq!(task.parallels, defaults.parallels);
        assert_eq!(task.max_retry, defaults.max_retry);
        assert_eq!(task.consumer_key(0), "1.0");
        assert_eq!(task.subscription_name(1), "task-1");
        assert!(!task.is_notification());
        assert!(!task.is_subscriber_failed());
    }

    #[test]
    fn test_notification_flags_follow_reserved_pair() {
        let notification = NotificationConfig::default();
        let failed = Task::from_record(
            &record(2),
            Arc::new(Registry::new(
                5,
                &notification.topic.to_lowercase(),
                &notification.tag_failed,
            )),
            TaskSubscribers::default(),
            &ConsumerConfig::default(),
            &notification,
        );
        assert!(failed.is_notification());
        assert!(failed.is_notification_failed());
        assert!(!failed.is_notification_succeed());
    }

    #[test]
    fn test_broadcast_subscription_per_slot() {
        let mut rec = record(3);
        rec.broadcasting = true;
        rec.parallels = Some(0);
        let task = Task::from_record(
            &rec,
            Arc::new(Registry::new(1, "orders", "created")),
            TaskSubscribers::default(),
            &ConsumerConfig::default(),
            &NotificationConfig::default(),
        );
        assert_eq!(task.parallels, 1);
        assert_eq!(task.subscription_name(0), "task-3-0");
    }
}
