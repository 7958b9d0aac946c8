//! Shared fixtures for the integration suites
//!
//! A loopback HTTP endpoint plus builders for the in-memory deployment:
//! an orders registry and both reserved notification pairs.

#![allow(dead_code)]

use queuehook::app::boot::Boot;
use queuehook::app::context::{AppContext, MemoryHandles};
use queuehook::core::config::{Config, PersistConfig};
use queuehook::store::api::{RegistryRecord, SubscriberRecord, TaskRecord};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub const ORDERS: u64 = 1;
pub const NOTIFY_FAILED: u64 = 2;
pub const NOTIFY_SUCCEED: u64 = 3;

/// HTTP/1.1 endpoint answering every request with one canned reply and
/// recording request bodies
pub struct Endpoint {
    pub url: String,
    bodies: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl Endpoint {
    pub async fn start(status: u16, reply_body: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        let reply = format!(
            "HTTP/1.1 {} OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            reply_body.len(),
            reply_body
        );
        let bodies = Arc::new(Mutex::new(Vec::new()));

        let recorded = bodies.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let recorded = recorded.clone();
                let reply = reply.clone();
                tokio::spawn(async move {
                    serve(stream, &reply, &recorded).await;
                });
            }
        });

        Self {
            url,
            bodies,
            handle,
        }
    }

    pub fn bodies(&self) -> Vec<String> {
        self.bodies.lock().unwrap().clone()
    }

    pub fn hits(&self) -> usize {
        self.bodies.lock().unwrap().len()
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(mut stream: TcpStream, reply: &str, recorded: &Mutex<Vec<String>>) -> Option<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_lowercase();
    let length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    recorded
        .lock()
        .unwrap()
        .push(String::from_utf8_lossy(&body).to_string());
    stream.write_all(reply.as_bytes()).await.ok()?;
    let _ = stream.shutdown().await;
    Some(())
}

pub fn registries() -> Vec<RegistryRecord> {
    vec![
        RegistryRecord {
            id: ORDERS,
            topic_name: "orders".into(),
            topic_tag: "created".into(),
            filter_tag: None,
        },
        RegistryRecord {
            id: NOTIFY_FAILED,
            topic_name: "QUEUEHOOK_NOTIFICATION".into(),
            topic_tag: "FAILED".into(),
            filter_tag: None,
        },
        RegistryRecord {
            id: NOTIFY_SUCCEED,
            topic_name: "QUEUEHOOK_NOTIFICATION".into(),
            topic_tag: "SUCCEED".into(),
            filter_tag: None,
        },
    ]
}

pub fn http(url: &str) -> SubscriberRecord {
    SubscriberRecord {
        dispatcher_kind: "http".into(),
        dispatcher_params: json!({ "url": url }),
        result_kind: "errno".into(),
        ..SubscriberRecord::default()
    }
}

pub fn task(id: u64, registry_id: u64, subscriber: SubscriberRecord) -> TaskRecord {
    TaskRecord {
        id,
        title: format!("task {}", id),
        registry_id,
        max_retry: Some(3),
        delay_seconds: Some(0),
        subscriber,
        ..TaskRecord::default()
    }
}

pub fn config(tasks: Vec<TaskRecord>) -> Config {
    Config {
        persist: PersistConfig {
            message_succeeded: true,
            message_failed: true,
            message_ignored: true,
            payload_succeeded: true,
            payload_failed: true,
        },
        registries: registries(),
        tasks,
        ..Config::default()
    }
}

/// A booted in-memory deployment
pub struct Deployment {
    pub context: AppContext,
    pub handles: MemoryHandles,
    pub boot: Boot,
}

impl Deployment {
    pub async fn start(tasks: Vec<TaskRecord>) -> Self {
        let (context, handles) = AppContext::in_memory(config(tasks)).unwrap();
        let boot = Boot::new(&context);
        boot.start().await.unwrap();
        Self {
            context,
            handles,
            boot,
        }
    }

    /// Publish straight to the broker, the way an upstream system would
    pub fn publish(&self, registry_id: u64, body: &str) -> String {
        let registry = self.context.cache.registry(registry_id).unwrap();
        self.handles
            .adapter
            .broker()
            .publish(&registry.topic_name, &registry.filter_tag, body)
            .unwrap()
    }

    pub async fn stop(self) {
        self.boot.stop().await.unwrap();
    }
}
