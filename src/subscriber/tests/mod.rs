//! Test suites for the subscriber pipeline
//!
//! `support` is shared with the consumer and retry suites.

mod factory;
pub(crate) mod support;
