//! # Data Transfer Objects (DTOs)
//!
//! Data structures exchanged between chat clients and the backend, over
//! both the REST API and the realtime WebSocket channel.
//!
//! ## Module Organization
//!
//! - [`auth`] - Signup and login DTOs
//! - [`chat`] - Roster, message history, upload responses, and realtime
//!   events

pub mod auth;
pub mod chat;

pub use auth::*;
pub use chat::*;
