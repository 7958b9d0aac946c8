//! Typed construction of subscriber slots

use crate::store::api::SubscriberRecord;
use crate::subscriber::bundle::Subscriber;
use crate::subscriber::condition::{JsonFieldCondition, RegexCondition};
use crate::subscriber::dispatcher::{HttpDispatcher, JsonRpcDispatcher};
use crate::subscriber::error::{SubscriberError, SubscriberResult};
use crate::subscriber::kinds::{ConditionKind, DispatcherKind, ResultKind};
use crate::subscriber::result::{EqualsResult, ErrnoResult};
use crate::subscriber::traits::{Condition, Dispatcher, ResultValidator};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;

/// Deserialise capability parameters; `null` reads as an empty object
pub(crate) fn parse_params<T: DeserializeOwned>(kind: &str, params: &Value) -> SubscriberResult<T> {
    let params = match params {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(params).map_err(|e| SubscriberError::InvalidParams {
        kind: kind.to_string(),
        message: e.to_string(),
    })
}

fn parse_kind<K: FromStr>(capability: &'static str, kind: &str) -> SubscriberResult<Option<K>> {
    let kind = kind.trim();
    if kind.is_empty() {
        return Ok(None);
    }
    K::from_str(kind)
        .map(Some)
        .map_err(|_| SubscriberError::UnknownKind {
            capability,
            kind: kind.to_string(),
        })
}

/// Builds subscribers, sharing one HTTP connection pool across dispatchers
#[derive(Debug, Clone)]
pub struct SubscriberFactory {
    client: reqwest::Client,
}

impl SubscriberFactory {
    pub fn new() -> SubscriberResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SubscriberError::Client {
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }

    /// Build one slot. `Ok(None)` when the slot has no dispatcher.
    pub fn build(&self, record: &SubscriberRecord) -> SubscriberResult<Option<Arc<Subscriber>>> {
        let dispatcher = match self.dispatcher(&record.dispatcher_kind, &record.dispatcher_params)? {
            Some(dispatcher) => dispatcher,
            None => return Ok(None),
        };

        let mut subscriber = Subscriber::new(dispatcher);
        if let Some(condition) = self.condition(&record.condition_kind, &record.condition_params)? {
            subscriber = subscriber.with_condition(condition);
        }
        if let Some(result) = self.result(&record.result_kind, &record.result_params)? {
            subscriber = subscriber.with_result(result);
        }
        Ok(Some(Arc::new(subscriber)))
    }

    pub fn condition(
        &self,
        kind: &str,
        params: &Value,
    ) -> SubscriberResult<Option<Box<dyn Condition>>> {
        let condition: Box<dyn Condition> = match parse_kind("condition", kind)? {
            None => return Ok(None),
            Some(ConditionKind::JsonField) => Box::new(JsonFieldCondition::from_params(params)?),
            Some(ConditionKind::Regex) => Box::new(RegexCondition::from_params(params)?),
        };
        Ok(Some(condition))
    }

    pub fn dispatcher(
        &self,
        kind: &str,
        params: &Value,
    ) -> SubscriberResult<Option<Box<dyn Dispatcher>>> {
        let client = self.client.clone();
        let dispatcher: Box<dyn Dispatcher> = match parse_kind("dispatcher", kind)? {
            None => return Ok(None),
            Some(DispatcherKind::Http) => Box::new(HttpDispatcher::from_params(client, params)?),
            Some(DispatcherKind::JsonRpc) => {
                Box::new(JsonRpcDispatcher::from_params(client, params)?)
            }
        };
        Ok(Some(dispatcher))
    }

    pub fn result(
        &self,
        kind: &str,
        params: &Value,
    ) -> SubscriberResult<Option<Box<dyn ResultValidator>>> {
        let result: Box<dyn ResultValidator> = match parse_kind("result", kind)? {
            None => return Ok(None),
            Some(ResultKind::Errno) => Box::new(ErrnoResult::from_params(params)?),
            Some(ResultKind::Equals) => Box::new(EqualsResult::from_params(params)?),
        };
        Ok(Some(result))
    }
}
