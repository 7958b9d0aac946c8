//! Subscriber pipeline: condition, dispatcher and result validator
//!
//! A task has up to three handler slots (normal, failed, succeed). Each
//! slot is a [`bundle::Subscriber`] built by [`factory::SubscriberFactory`]
//! from the persisted kind strings and JSON parameters:
//!
//! ```text
//! message ─► Condition? ──ignored──► done
//!               │ satisfied
//!               ▼
//!           Dispatcher ──transport error──► retry decision
//!               │ response body
//!               ▼
//!            Result? ──business error──► retry decision
//!               │
//!               ▼
//!            success
//! ```
//!
//! Kinds are a closed set of enums. An empty kind leaves the capability
//! out; an unknown kind or bad parameters fail the whole slot at load time.

pub mod api;
pub mod bundle;
pub mod condition;
pub mod dispatcher;
pub mod error;
pub mod factory;
pub mod kinds;
pub mod result;
pub mod traits;

#[cfg(test)]
pub(crate) mod tests;
