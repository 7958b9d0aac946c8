//! Topic/tag registry entries

use crate::store::api::RegistryRecord;

/// Case-insensitive lookup key for a (topic, tag) pair
pub fn registry_key(topic_name: &str, topic_tag: &str) -> String {
    format!("{}:{}", topic_name, topic_tag).to_uppercase()
}

/// Addressing unit for publish and subscribe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    pub id: u64,
    pub topic_name: String,
    pub topic_tag: String,
    /// Tag used on the wire; defaults to `T<id>`
    pub filter_tag: String,
}

impl Registry {
    pub fn new(id: u64, topic_name: &str, topic_tag: &str) -> Self {
        Self {
            id,
            topic_name: topic_name.to_string(),
            topic_tag: topic_tag.to_string(),
            filter_tag: format!("T{}", id),
        }
    }

    pub fn from_record(record: &RegistryRecord) -> Self {
        let mut registry = Self::new(record.id, &record.topic_name, &record.topic_tag);
        if let Some(filter_tag) = record
            .filter_tag
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            registry.filter_tag = filter_tag.to_string();
        }
        registry
    }

    pub fn key(&self) -> String {
        registry_key(&self.topic_name, &self.topic_tag)
    }
}
