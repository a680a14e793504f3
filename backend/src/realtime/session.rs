//! # Connection Lifecycle Manager
//!
//! Drives one WebSocket connection through its lifecycle:
//! `Open (unannounced) -> Announced (identity bound) -> Closed`.
//!
//! An unannounced connection is inert: it is never registered, never
//! receives broadcasts, and cannot send. Announce binds the identity in
//! the registry (last announce wins), disconnect unbinds it and
//! re-broadcasts presence. There is no heartbeat: a connection that
//! vanishes without a transport-level close keeps its entry until the
//! transport finally reports the loss. Known gap, inherited deliberately.

use super::presence::broadcast_presence;
use super::registry::ConnectionHandle;
use super::router::route_message;
use crate::database::repository::UserRepository;
use crate::server::AppState;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use shared::{ClientEvent, ServerEvent};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle state of one connection. `Closed` is reached by falling out
/// of the receive loop and is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionState {
    Open,
    Announced(String),
}

/// Run one connection to completion. Called from the upgrade handler;
/// returns only when the transport is gone and cleanup has finished.
pub async fn run_session(state: AppState, socket: WebSocket, client_ip: Option<String>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<ServerEvent>();
    let conn = ConnectionHandle::new(tx);
    let connection_id = conn.id();

    info!(connection = %connection_id, client_ip = ?client_ip, "websocket connected");

    // Send half: drain the per-connection event queue onto the socket.
    // Deliveries and broadcasts land on the queue from other tasks; only
    // this task ever writes to the transport.
    let send_task = tokio::spawn(async move {
        let mut events = UnboundedReceiverStream::new(rx);
        while let Some(event) = events.next().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    warn!(connection = %connection_id, error = %e, "failed to serialize event");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    // Receive half: drive the lifecycle state machine until the
    // transport closes or errors.
    let mut session = SessionState::Open;
    while let Some(msg) = ws_rx.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                debug!(connection = %connection_id, error = %e, "websocket receive error");
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                let event: ClientEvent = match serde_json::from_str(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(connection = %connection_id, error = %e, "malformed client event");
                        conn.deliver(ServerEvent::SendError {
                            reason: "malformed event".to_string(),
                        });
                        continue;
                    }
                };
                handle_client_event(&state, &conn, &mut session, event).await;
            }
            Message::Close(_) => {
                debug!(connection = %connection_id, "close frame received");
                break;
            }
            // axum answers pings at the protocol level; binary frames
            // have no meaning in this protocol
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => {}
        }
    }

    send_task.abort();
    close_session(&state, connection_id, session).await;

    info!(connection = %connection_id, "websocket closed");
}

/// Disconnect cleanup, the transition into `Closed`. Only an announced
/// connection ever registered anything; an inert one needs no cleanup.
/// If a later announce already replaced this connection's entry (last
/// announce wins), the scan finds nothing and the newer binding is left
/// untouched.
async fn close_session(state: &AppState, connection_id: Uuid, session: SessionState) {
    if let SessionState::Announced(_) = session {
        if let Some(username) = state.registry.unregister_by_connection(connection_id).await {
            if let Err(e) = UserRepository::set_online(&state.db, &username, false).await {
                warn!(username, error = %e, "failed to persist offline flag");
            }
            broadcast_presence(&state.registry).await;
            info!(connection = %connection_id, username, "user disconnected");
        }
    }
}

async fn handle_client_event(
    state: &AppState,
    conn: &ConnectionHandle,
    session: &mut SessionState,
    event: ClientEvent,
) {
    match event {
        ClientEvent::Announce { username } => {
            announce(state, conn, session, username).await;
        }
        ClientEvent::SendMessage {
            from,
            to,
            payload,
            kind,
        } => {
            // Router and broadcaster ignore unannounced connections
            if *session == SessionState::Open {
                conn.deliver(ServerEvent::SendError {
                    reason: "announce an identity before sending".to_string(),
                });
                return;
            }
            route_message(&state.db, &state.registry, conn, &from, &to, &payload, kind).await;
        }
    }
}

/// Bind this connection to an identity. Re-announcing the same identity
/// is an effective no-op that still re-triggers a presence broadcast;
/// announcing a different identity rebinds the connection and releases
/// the old entry.
async fn announce(
    state: &AppState,
    conn: &ConnectionHandle,
    session: &mut SessionState,
    username: String,
) {
    if let SessionState::Announced(previous) = &*session {
        if *previous != username {
            if let Some(released) = state.registry.unregister_by_connection(conn.id()).await {
                if let Err(e) = UserRepository::set_online(&state.db, &released, false).await {
                    warn!(username = released, error = %e, "failed to persist offline flag");
                }
            }
        }
    }

    state.registry.register(&username, conn.clone()).await;
    if let Err(e) = UserRepository::set_online(&state.db, &username, true).await {
        // Registry stays authoritative; the persisted flag catches up on
        // the next transition
        warn!(username, error = %e, "failed to persist online flag");
    }

    info!(connection = %conn.id(), username, "identity announced");
    *session = SessionState::Announced(username);

    broadcast_presence(&state.registry).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::database::repository::UserRepository;
    use crate::database::DbPool;
    use crate::realtime::Registry;
    use crate::uploads::BlobStore;
    use shared::PayloadKind;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn setup_test_db() -> DbPool {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test database");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                online BOOLEAN NOT NULL DEFAULT 0,
                last_activity TEXT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&pool)
        .await
        .expect("Failed to create users table");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sender TEXT NOT NULL,
                recipient TEXT NOT NULL,
                body TEXT NOT NULL,
                kind TEXT NOT NULL DEFAULT 'text',
                timestamp TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .expect("Failed to create messages table");

        pool
    }

    /// AppState over an in-memory database. The TempDir must outlive the
    /// returned state.
    async fn test_state() -> (AppState, TempDir) {
        let pool = setup_test_db().await;
        let dir = TempDir::new().unwrap();
        let blobs = Arc::new(
            BlobStore::new(dir.path().to_path_buf(), 1024)
                .await
                .unwrap(),
        );

        let state = AppState {
            db: pool,
            config: Config {
                database_url: "sqlite::memory:".to_string(),
                jwt_secret: "test-secret-key-must-be-at-least-32-characters-long!".to_string(),
                jwt_expiration_hours: 24,
                upload_dir: "unused-in-tests".to_string(),
                max_upload_bytes: 1024,
            },
            registry: Arc::new(Registry::new()),
            blobs,
        };
        (state, dir)
    }

    fn connection() -> (ConnectionHandle, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionHandle::new(tx), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    async fn is_online(db: &DbPool, username: &str) -> bool {
        UserRepository::find_by_username(db, username)
            .await
            .unwrap()
            .unwrap()
            .online
    }

    #[tokio::test]
    async fn test_send_before_announce_is_rejected() {
        // Arrange: an unannounced connection is inert
        let (state, _dir) = test_state().await;
        let (conn, mut rx) = connection();
        let mut session = SessionState::Open;

        // Act
        handle_client_event(
            &state,
            &conn,
            &mut session,
            ClientEvent::SendMessage {
                from: "alice".to_string(),
                to: "bob".to_string(),
                payload: "hi".to_string(),
                kind: PayloadKind::Text,
            },
        )
        .await;

        // Assert: exactly one error back, nothing persisted, no binding
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ServerEvent::SendError { .. }));
        assert_eq!(session, SessionState::Open);

        let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(stored, 0);
        assert_eq!(state.registry.online_count().await, 0);
    }

    #[tokio::test]
    async fn test_announce_registers_and_persists_online() {
        // Arrange
        let (state, _dir) = test_state().await;
        UserRepository::create(&state.db, "alice", "hash").await.unwrap();
        let (conn, mut rx) = connection();
        let mut session = SessionState::Open;

        // Act
        announce(&state, &conn, &mut session, "alice".to_string()).await;

        // Assert
        assert_eq!(session, SessionState::Announced("alice".to_string()));
        assert_eq!(
            state.registry.lookup("alice").await.unwrap().id(),
            conn.id()
        );
        assert!(is_online(&state.db, "alice").await);
        assert_eq!(
            drain(&mut rx),
            vec![ServerEvent::PresenceUpdate {
                online: vec!["alice".to_string()],
            }]
        );
    }

    #[tokio::test]
    async fn test_reannounce_same_identity_rebroadcasts() {
        // Arrange
        let (state, _dir) = test_state().await;
        let (conn, mut rx) = connection();
        let mut session = SessionState::Open;
        announce(&state, &conn, &mut session, "alice".to_string()).await;

        // Act: duplicate announce is an effective no-op
        announce(&state, &conn, &mut session, "alice".to_string()).await;

        // Assert: still one entry, but a second broadcast went out
        assert_eq!(state.registry.online_count().await, 1);
        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[tokio::test]
    async fn test_rebind_releases_previous_identity() {
        // Arrange
        let (state, _dir) = test_state().await;
        UserRepository::create(&state.db, "alice", "hash").await.unwrap();
        UserRepository::create(&state.db, "bob", "hash").await.unwrap();
        let (conn, mut rx) = connection();
        let mut session = SessionState::Open;
        announce(&state, &conn, &mut session, "alice".to_string()).await;

        // Act: the same connection announces a different identity
        announce(&state, &conn, &mut session, "bob".to_string()).await;

        // Assert: old binding released, flags swapped
        assert_eq!(session, SessionState::Announced("bob".to_string()));
        assert_eq!(state.registry.snapshot().await, vec!["bob".to_string()]);
        assert!(!is_online(&state.db, "alice").await);
        assert!(is_online(&state.db, "bob").await);

        let latest = drain(&mut rx).pop().unwrap();
        assert_eq!(
            latest,
            ServerEvent::PresenceUpdate {
                online: vec!["bob".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn test_disconnect_unregisters_and_rebroadcasts() {
        // Arrange: alice and bob both announced
        let (state, _dir) = test_state().await;
        UserRepository::create(&state.db, "alice", "hash").await.unwrap();
        let (alice, _alice_rx) = connection();
        let (bob, mut bob_rx) = connection();
        let mut alice_session = SessionState::Open;
        let mut bob_session = SessionState::Open;
        announce(&state, &alice, &mut alice_session, "alice".to_string()).await;
        announce(&state, &bob, &mut bob_session, "bob".to_string()).await;
        drain(&mut bob_rx);

        // Act: alice's transport goes away
        close_session(&state, alice.id(), alice_session).await;

        // Assert: entry purged, flag persisted, survivors notified
        assert_eq!(state.registry.snapshot().await, vec!["bob".to_string()]);
        assert!(!is_online(&state.db, "alice").await);
        assert_eq!(
            drain(&mut bob_rx),
            vec![ServerEvent::PresenceUpdate {
                online: vec!["bob".to_string()],
            }]
        );
    }

    #[tokio::test]
    async fn test_disconnect_from_open_is_noop() {
        // Arrange: one announced bystander, one connection that never
        // announced
        let (state, _dir) = test_state().await;
        let (bob, mut bob_rx) = connection();
        let mut bob_session = SessionState::Open;
        announce(&state, &bob, &mut bob_session, "bob".to_string()).await;
        drain(&mut bob_rx);
        let (inert, _inert_rx) = connection();

        // Act
        close_session(&state, inert.id(), SessionState::Open).await;

        // Assert: no registry change, no broadcast
        assert_eq!(state.registry.online_count().await, 1);
        assert!(drain(&mut bob_rx).is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_after_identity_reclaimed_leaves_new_binding() {
        // Arrange: a second connection takes over alice's identity
        let (state, _dir) = test_state().await;
        UserRepository::create(&state.db, "alice", "hash").await.unwrap();
        let (first, _first_rx) = connection();
        let (second, _second_rx) = connection();
        let mut first_session = SessionState::Open;
        let mut second_session = SessionState::Open;
        announce(&state, &first, &mut first_session, "alice".to_string()).await;
        announce(&state, &second, &mut second_session, "alice".to_string()).await;

        // Act: the abandoned first connection finally disconnects
        close_session(&state, first.id(), first_session).await;

        // Assert: the newer binding survives, alice stays online
        assert_eq!(
            state.registry.lookup("alice").await.unwrap().id(),
            second.id()
        );
        assert!(is_online(&state.db, "alice").await);
    }
}
