//! queuehook: deliver message queue traffic to HTTP and JSON-RPC callbacks
//!
//! Tasks bind a registry (topic, tag) to up to three subscribers: the
//! normal callback and optional failure/success notification callbacks.
//! Consumers run per task × parallel slot, the producer publishes through
//! a bounded bucket, and a retry sweep re-drives persisted WAITING records.

pub mod adapter;
pub mod app;
pub mod cache;
pub mod consumer;
pub mod core;
pub mod model;
pub mod producer;
pub mod retry;
pub mod store;
pub mod subscriber;
