//! # Chat Data Transfer Objects
//!
//! Roster and history rows, upload responses, and the realtime WebSocket
//! event protocol shared by server and clients.

use serde::{Deserialize, Serialize};

/// Payload kind carried by a message.
///
/// Non-text kinds carry a blob reference (obtained beforehand from the
/// upload endpoint) in the message payload instead of the text itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Text,
    Image,
    Voice,
    Document,
    Video,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Text => "text",
            PayloadKind::Image => "image",
            PayloadKind::Voice => "voice",
            PayloadKind::Document => "document",
            PayloadKind::Video => "video",
        }
    }
}

impl std::str::FromStr for PayloadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(PayloadKind::Text),
            "image" => Ok(PayloadKind::Image),
            "voice" => Ok(PayloadKind::Voice),
            "document" => Ok(PayloadKind::Document),
            "video" => Ok(PayloadKind::Video),
            other => Err(format!("unknown payload kind: {other}")),
        }
    }
}

/// Events a client sends over the realtime channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Bind this connection to an identity
    Announce { username: String },
    /// Send a message to a peer
    SendMessage {
        from: String,
        to: String,
        payload: String,
        kind: PayloadKind,
    },
}

/// Events the server pushes over the realtime channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full-state list of currently online usernames
    PresenceUpdate { online: Vec<String> },
    /// A persisted message, pushed to the recipient (if online) and
    /// always echoed to the sender with the canonical server timestamp
    MessageDelivered {
        from: String,
        to: String,
        payload: String,
        kind: PayloadKind,
        timestamp: String,
    },
    /// A failed send, reported only to the originating connection
    SendError { reason: String },
}

/// Roster row: one entry per known user, most recently active first
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RosterEntry {
    pub username: String,
    pub online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<String>,
}

/// History query parameters: the unordered pair of participants
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryParams {
    pub from: String,
    pub to: String,
}

/// A stored message returned from a history query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryMessage {
    pub from: String,
    pub to: String,
    pub payload: String,
    pub kind: PayloadKind,
    pub timestamp: String,
}

/// Response after a successful media upload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadResponse {
    pub url: String,
    pub name: String,
    pub content_type: String,
    pub size: u64,
}
