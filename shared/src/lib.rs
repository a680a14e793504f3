//! # Shared Data Transfer Objects Library
//!
//! This library defines the contract between chat clients and the backend.
//! All DTOs use JSON serialization via `serde` for API and WebSocket
//! communication.
//!
//! ## Structure
//!
//! - **[`dto::auth`]**: Signup/login requests and responses
//! - **[`dto::chat`]**: Roster, history, uploads, and the realtime
//!   WebSocket event protocol
//!
//! ## Wire Format
//!
//! - Field names use **snake_case** in Rust, which maps to snake_case in
//!   JSON by default
//! - Optional fields are omitted from JSON when `None`
//! - The realtime events are internally tagged enums: every frame carries
//!   a `"type"` discriminator

pub mod dto;

// Re-export commonly used types for convenience
pub use dto::*;
