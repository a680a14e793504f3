//! # WebSocket Handler
//!
//! HTTP endpoint upgrading to the realtime channel.
//!
//! ## Endpoints
//!
//! - `GET /api/ws` - realtime chat connection; the client announces an
//!   identity, then exchanges `send_message` / `message_delivered` /
//!   `presence_update` events as JSON text frames

use crate::realtime::session::run_session;
use crate::server::AppState;
use axum::extract::{ws::WebSocketUpgrade, ConnectInfo, State};
use axum::http::HeaderMap;
use axum::response::Response;
use std::net::SocketAddr;
use tracing::info;

/// WebSocket upgrade for the realtime chat channel.
///
/// **Route**: `GET /api/ws`
///
/// The upgraded socket is handed to `realtime::session`, which owns the
/// connection's lifecycle from here: announce, routing, disconnect
/// cleanup.
pub async fn chat_websocket(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    let client_ip = headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or("").trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| Some(addr.ip().to_string()));

    info!(client_ip = ?client_ip, "[WS] connection attempt");

    ws.on_upgrade(move |socket| run_session(state, socket, client_ip))
}
