//! Retry sweeps over persisted WAITING records
//!
//! On every tick, or when triggered, [`manager::RetryManager`] pulls
//! bounded batches of WAITING messages and payloads and re-drives them
//! through the consume executor and the producer. Each record is claimed
//! first with a conditional `WAITING → PROCESSING` update; a claim that
//! affects no row belongs to another instance and is skipped. Sweeps of
//! the same kind never overlap.

pub mod api;
pub mod error;
pub mod manager;

#[cfg(test)]
mod tests;
