//! # Realtime Core
//!
//! The presence-and-delivery core of the relay:
//!
//! - [`registry`] - the authoritative in-memory map of identity to live
//!   connection, the single source of truth for "who is online"
//! - [`presence`] - full-state online-user broadcast on every registry
//!   mutation
//! - [`router`] - persist-then-deliver message routing
//! - [`session`] - per-connection lifecycle state machine over the
//!   WebSocket transport

pub mod presence;
pub mod registry;
pub mod router;
pub mod session;

pub use registry::{ConnectionHandle, Registry};
pub use router::{route_message, DeliveryOutcome};
