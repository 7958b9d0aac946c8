//! Vendor adapter contract
//!
//! Everything vendor specific sits behind three independently lifecycled
//! roles:
//!
//! - [`traits::Consumer`]: one per task × parallel slot. Owns the receive
//!   loop, hands every message to the injected [`traits::MessageHandler`]
//!   and turns its retry flag into the vendor's redelivery primitive.
//! - [`traits::Producer`]: one shared instance publishing payloads.
//! - [`traits::Remoter`]: idempotent provisioning of topics and
//!   subscriptions; reads live attributes before mutating anything.
//!
//! [`traits::AdapterFactory`] constructs all three for the configured
//! [`traits::AdapterKind`]. The bundled `memory` vendor is a complete
//! in-process broker.

pub mod api;
pub mod error;
pub mod memory;
pub mod traits;
