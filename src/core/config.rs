//! TOML configuration loading and validation
//!
//! Every section is optional and defaulted. The file location is either
//! given on the command line or discovered under the platform config
//! directory; a missing default file simply means "all defaults".

use crate::adapter::api::AdapterKind;
use crate::store::api::{RegistryRecord, TaskRecord};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read configuration file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Cannot parse configuration: {message}")]
    Parse { message: String },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl crate::core::error_handling::ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, ConfigError::Parse { .. } | ConfigError::Invalid { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ConfigError::Parse { message } | ConfigError::Invalid { message } => Some(message),
            ConfigError::Io { .. } => None,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: String,
    pub file: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdapterConfig {
    pub kind: AdapterKind,
    /// Attempts for idempotent provisioning calls
    pub provision_attempts: usize,
    pub provision_delay_ms: u64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            kind: AdapterKind::Memory,
            provision_attempts: 3,
            provision_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConsumerConfig {
    pub parallels: u32,
    pub concurrency: u32,
    pub max_retry: u32,
    pub delay_seconds: u64,
    pub reload_interval_secs: u64,
    /// Width of the bounded pool running notification emission
    pub notify_concurrency: usize,
    pub shutdown_timeout_secs: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            parallels: 1,
            concurrency: 4,
            max_retry: 3,
            delay_seconds: 5,
            reload_interval_secs: 60,
            notify_concurrency: 64,
            shutdown_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProducerConfig {
    pub bucket_capacity: usize,
    pub concurrency: usize,
    pub max_retry: u32,
    pub shutdown_timeout_secs: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            bucket_capacity: 10_000,
            concurrency: 32,
            max_retry: 3,
            shutdown_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub interval_secs: u64,
    pub batch_size: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            batch_size: 100,
        }
    }
}

/// Reserved (topic, tag) pairs carrying delivery outcomes
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotificationConfig {
    pub topic: String,
    pub tag_failed: String,
    pub tag_succeed: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            topic: "QUEUEHOOK_NOTIFICATION".to_string(),
            tag_failed: "FAILED".to_string(),
            tag_succeed: "SUCCEED".to_string(),
        }
    }
}

/// Which outcomes are written to the store
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PersistConfig {
    pub message_succeeded: bool,
    pub message_failed: bool,
    pub message_ignored: bool,
    pub payload_succeeded: bool,
    pub payload_failed: bool,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            message_succeeded: false,
            message_failed: true,
            message_ignored: false,
            payload_succeeded: false,
            payload_failed: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub log: LogConfig,
    pub adapter: AdapterConfig,
    pub consumer: ConsumerConfig,
    pub producer: ProducerConfig,
    pub retry: RetryConfig,
    pub notification: NotificationConfig,
    pub persist: PersistConfig,
    /// Seed rows for the bundled in-memory store
    pub registries: Vec<RegistryRecord>,
    pub tasks: Vec<TaskRecord>,
}

impl Config {
    /// Load from an explicit path, the default location, or fall back to defaults
    pub fn load(config_file: Option<&Path>) -> ConfigResult<Self> {
        let path = match config_file {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::Io {
                        path: path.display().to_string(),
                        message: "file does not exist".to_string(),
                    });
                }
                Some(path.to_path_buf())
            }
            None => Self::default_path().filter(|p| p.exists()),
        };

        match path {
            Some(path) => {
                log::debug!("Loading configuration from {}", path.display());
                let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
                Self::from_toml_str(&contents)
            }
            None => {
                log::debug!("No configuration file found, using defaults");
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// `<config_dir>/Queuehook/queuehook.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("Queuehook").join("queuehook.toml"))
    }

    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        let config: Config = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |message: &str| {
            Err(ConfigError::Invalid {
                message: message.to_string(),
            })
        };

        if self.producer.bucket_capacity == 0 {
            return invalid("producer.bucket_capacity must be greater than 0");
        }
        if self.producer.concurrency == 0 {
            return invalid("producer.concurrency must be greater than 0");
        }
        if self.consumer.concurrency == 0 {
            return invalid("consumer.concurrency must be greater than 0");
        }
        if self.consumer.notify_concurrency == 0 {
            return invalid("consumer.notify_concurrency must be greater than 0");
        }
        if self.consumer.reload_interval_secs == 0 || self.retry.interval_secs == 0 {
            return invalid("reload and retry intervals must be greater than 0");
        }
        if self.retry.batch_size == 0 {
            return invalid("retry.batch_size must be greater than 0");
        }
        if self.notification.topic.trim().is_empty()
            || self.notification.tag_failed.trim().is_empty()
            || self.notification.tag_succeed.trim().is_empty()
        {
            return invalid("notification topic and tags must not be empty");
        }
        if self
            .notification
            .tag_failed
            .eq_ignore_ascii_case(&self.notification.tag_succeed)
        {
            return invalid("notification.tag_failed and tag_succeed must differ");
        }
        if !matches!(self.log.format.as_str(), "text" | "ext" | "json") {
            return Err(ConfigError::Invalid {
                message: format!("log.format '{}' is not one of text, ext, json", self.log.format),
            });
        }

        let mut keys = HashSet::new();
        for registry in &self.registries {
            let key = crate::model::registry::registry_key(&registry.topic_name, &registry.topic_tag);
            if !keys.insert(key.clone()) {
                return Err(ConfigError::Invalid {
                    message: format!("duplicate registry {}", key),
                });
            }
        }

        Ok(())
    }

    pub fn reload_interval(&self) -> Duration {
        Duration::from_secs(self.consumer.reload_interval_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry.interval_secs)
    }

    pub fn consumer_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.consumer.shutdown_timeout_secs)
    }

    pub fn producer_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.producer.shutdown_timeout_secs)
    }
}
