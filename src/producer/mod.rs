//! Outbound publishing
//!
//! Payloads reach the broker through one of two paths:
//!
//! - [`manager::ProducerManager::publish`] queues into a bounded
//!   [`bucket::Bucket`] and returns immediately. Drain workers, at most
//!   `producer.concurrency` of them, pop and send in the background.
//! - [`manager::ProducerManager::publish_sync`] bypasses the bucket and
//!   waits for the vendor. Notifications use it.
//!
//! Every send refuses to touch the vendor unless the shared adapter
//! producer reports `ready`. Outcomes are persisted according to the
//! `[persist]` toggles; a failed send below `producer.max_retry` is stored
//! WAITING for the retry sweep.

pub mod api;
pub mod bucket;
pub mod error;
pub mod manager;

#[cfg(test)]
mod tests;
