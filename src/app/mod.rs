//! Application wiring
//!
//! [`context::AppContext`] owns the shared pieces (config, store, cache,
//! adapter, pools). [`boot::Boot`] builds the producer, consumer and retry
//! managers over it; [`startup`] is what the binary runs.

pub mod boot;
pub mod cli;
pub mod context;
pub mod error;
pub mod startup;
