//! Built-in dispatchers
//!
//! Both POST the dispatcher body to a configured endpoint. Headers carry the
//! delivery identity so endpoints can de-duplicate at-least-once delivery:
//! `X-Message-Id`, `X-Message-Dequeue` and `X-Task-Id` (the source task).

use crate::model::message::Message;
use crate::model::task::Task;
use crate::subscriber::error::{
    DispatchError, DispatchResult, SubscriberError, SubscriberResult,
};
use crate::subscriber::factory::parse_params;
use crate::subscriber::kinds::DispatcherKind;
use crate::subscriber::traits::Dispatcher;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

pub const HEADER_MESSAGE_ID: &str = "X-Message-Id";
pub const HEADER_MESSAGE_DEQUEUE: &str = "X-Message-Dequeue";
pub const HEADER_TASK_ID: &str = "X-Task-Id";

fn default_method() -> String {
    "POST".to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

fn invalid(kind: DispatcherKind, message: impl Into<String>) -> SubscriberError {
    SubscriberError::InvalidParams {
        kind: kind.to_string(),
        message: message.into(),
    }
}

fn parse_url(kind: DispatcherKind, url: &str) -> SubscriberResult<Url> {
    let url = Url::parse(url).map_err(|e| invalid(kind, format!("url: {}", e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(kind, format!("unsupported url scheme '{}'", other))),
    }
}

fn parse_headers(
    kind: DispatcherKind,
    headers: &BTreeMap<String, String>,
) -> SubscriberResult<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| invalid(kind, format!("header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| invalid(kind, format!("header value for '{}': {}", name, e)))?;
        map.insert(name, value);
    }
    Ok(map)
}

fn transport(error: reqwest::Error) -> DispatchError {
    DispatchError::Transport {
        message: error.to_string(),
        body: None,
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HttpParams {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
    #[serde(default = "default_content_type")]
    content_type: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

/// Plain HTTP callback; any non-2xx status is a transport error
#[derive(Debug)]
pub struct HttpDispatcher {
    client: Client,
    url: Url,
    method: Method,
    timeout: Duration,
    content_type: HeaderValue,
    headers: HeaderMap,
}

impl HttpDispatcher {
    pub fn from_params(client: Client, params: &Value) -> SubscriberResult<Self> {
        let kind = DispatcherKind::Http;
        let params: HttpParams = parse_params(kind.as_ref(), params)?;

        let method = Method::from_str(&params.method.to_uppercase())
            .map_err(|e| invalid(kind, format!("method: {}", e)))?;
        let content_type = HeaderValue::from_str(&params.content_type)
            .map_err(|e| invalid(kind, format!("content_type: {}", e)))?;
        if params.timeout_ms == 0 {
            return Err(invalid(kind, "timeout_ms must be greater than 0"));
        }

        Ok(Self {
            client,
            url: parse_url(kind, &params.url)?,
            method,
            timeout: Duration::from_millis(params.timeout_ms),
            content_type,
            headers: parse_headers(kind, &params.headers)?,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    fn kind(&self) -> DispatcherKind {
        DispatcherKind::Http
    }

    async fn dispatch(
        &self,
        _task: &Task,
        source: &Task,
        message: &Message,
    ) -> DispatchResult<String> {
        let response = self
            .client
            .request(self.method.clone(), self.url.clone())
            .timeout(self.timeout)
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, self.content_type.clone())
            .header(HEADER_MESSAGE_ID, message.message_id.as_str())
            .header(HEADER_MESSAGE_DEQUEUE, message.dequeue.to_string())
            .header(HEADER_TASK_ID, source.id.to_string())
            .body(message.dispatcher_body.clone())
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        if !status.is_success() {
            return Err(DispatchError::Transport {
                message: format!("{} responded {}", self.url, status),
                body: Some(body),
            });
        }
        Ok(body)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonRpcParams {
    url: String,
    method: String,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

/// JSON-RPC 2.0 call. The message travels in `params`; an `error` member in
/// the reply is a business error and `result` becomes the response body.
#[derive(Debug)]
pub struct JsonRpcDispatcher {
    client: Client,
    url: Url,
    method: String,
    timeout: Duration,
    headers: HeaderMap,
}

impl JsonRpcDispatcher {
    pub fn from_params(client: Client, params: &Value) -> SubscriberResult<Self> {
        let kind = DispatcherKind::JsonRpc;
        let params: JsonRpcParams = parse_params(kind.as_ref(), params)?;
        if params.method.trim().is_empty() {
            return Err(invalid(kind, "method must not be empty"));
        }
        if params.timeout_ms == 0 {
            return Err(invalid(kind, "timeout_ms must be greater than 0"));
        }

        Ok(Self {
            client,
            url: parse_url(kind, &params.url)?,
            method: params.method,
            timeout: Duration::from_millis(params.timeout_ms),
            headers: parse_headers(kind, &params.headers)?,
        })
    }

    fn envelope(&self, source: &Task, message: &Message) -> Value {
        let body = serde_json::from_str::<Value>(&message.dispatcher_body)
            .unwrap_or_else(|_| Value::String(message.dispatcher_body.clone()));
        json!({
            "jsonrpc": "2.0",
            "id": message.message_id,
            "method": self.method,
            "params": {
                "taskId": source.id,
                "messageId": message.message_id,
                "dequeue": message.dequeue,
                "body": body,
            },
        })
    }
}

#[async_trait]
impl Dispatcher for JsonRpcDispatcher {
    fn kind(&self) -> DispatcherKind {
        DispatcherKind::JsonRpc
    }

    async fn dispatch(
        &self,
        _task: &Task,
        source: &Task,
        message: &Message,
    ) -> DispatchResult<String> {
        let response = self
            .client
            .post(self.url.clone())
            .timeout(self.timeout)
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, DEFAULT_CONTENT_TYPE)
            .header(HEADER_MESSAGE_ID, message.message_id.as_str())
            .header(HEADER_MESSAGE_DEQUEUE, message.dequeue.to_string())
            .header(HEADER_TASK_ID, source.id.to_string())
            .body(self.envelope(source, message).to_string())
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        if !status.is_success() {
            return Err(DispatchError::Transport {
                message: format!("{} responded {}", self.url, status),
                body: Some(body),
            });
        }

        let reply: Value =
            serde_json::from_str(&body).map_err(|_| DispatchError::Business {
                message: "reply is not a JSON-RPC object".to_string(),
            })?;
        match reply.get("error") {
            Some(error) if !error.is_null() => Err(DispatchError::Business {
                message: error.to_string(),
            }),
            _ => Ok(reply
                .get("result")
                .map(|result| match result {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_default()),
        }
    }
}
