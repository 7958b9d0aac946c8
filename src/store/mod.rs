//! Persistence boundary
//!
//! The engine reads enabled tasks and registries from here, writes message
//! and payload outcomes, and claims waiting records for the retry sweep
//! with a conditional status update. [`memory::InMemoryStore`] backs the
//! binary and the tests; a relational store plugs in behind the same
//! [`traits::Store`] trait.

pub mod api;
pub mod error;
pub mod memory;
pub mod traits;
pub mod types;
