//! # Connection Registry
//!
//! Process-wide mapping from identity to the currently active connection
//! handle. Every mutation and every snapshot goes through the one mutex,
//! so a register racing a disconnect for the same identity resolves
//! deterministically (last writer wins).

use shared::ServerEvent;
use std::collections::HashMap;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;
use uuid::Uuid;

/// Non-owning reference to one live client connection.
///
/// The WebSocket task owns the receiving half of the channel and forwards
/// events onto the socket; the registry only holds the sending half. A
/// closed channel means the connection is gone, which delivery treats as
/// "recipient offline" until the disconnect cleanup purges the entry.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: Uuid,
    sender: mpsc::UnboundedSender<ServerEvent>,
}

impl ConnectionHandle {
    pub fn new(sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Push an event to this connection. Returns false if the underlying
    /// transport has already gone away.
    pub fn deliver(&self, event: ServerEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

/// The presence directory: identity -> live connection handle.
#[derive(Debug, Default)]
pub struct Registry {
    inner: Mutex<HashMap<String, ConnectionHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an identity to a connection. Idempotent overwrite: a second
    /// announce for the same identity replaces the previous entry, and
    /// the abandoned connection is not notified or closed.
    pub async fn register(&self, username: &str, handle: ConnectionHandle) {
        let mut map = self.inner.lock().await;
        let replaced = map.insert(username.to_string(), handle);
        if let Some(old) = replaced {
            debug!(
                username,
                old_connection = %old.id(),
                "replaced existing registry entry"
            );
        }
    }

    /// Look up the live connection for an identity, if any.
    pub async fn lookup(&self, username: &str) -> Option<ConnectionHandle> {
        self.inner.lock().await.get(username).cloned()
    }

    /// Remove the entry bound to the given connection, returning the
    /// identity it carried. The disconnect event only knows the
    /// connection, so this scans the map; O(n) in online users, a
    /// deliberate choice at this system's scale.
    pub async fn unregister_by_connection(&self, connection_id: Uuid) -> Option<String> {
        let mut map = self.inner.lock().await;
        let username = map
            .iter()
            .find(|(_, handle)| handle.id() == connection_id)
            .map(|(name, _)| name.clone())?;
        map.remove(&username);
        Some(username)
    }

    /// Currently registered identities, sorted for deterministic output.
    pub async fn snapshot(&self) -> Vec<String> {
        let map = self.inner.lock().await;
        let mut names: Vec<String> = map.keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot plus the handles to deliver it to, taken under a single
    /// lock acquisition so a broadcast never mixes two generations of
    /// the directory.
    pub async fn presence_view(&self) -> (Vec<String>, Vec<ConnectionHandle>) {
        let map = self.inner.lock().await;
        let mut names: Vec<String> = map.keys().cloned().collect();
        names.sort();
        let handles = map.values().cloned().collect();
        (names, handles)
    }

    pub async fn online_count(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> (ConnectionHandle, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionHandle::new(tx), rx)
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = Registry::new();
        let (alice, _rx) = handle();

        registry.register("alice", alice.clone()).await;

        let found = registry.lookup("alice").await.unwrap();
        assert_eq!(found.id(), alice.id());
        assert!(registry.lookup("bob").await.is_none());
    }

    #[tokio::test]
    async fn test_last_register_wins() {
        let registry = Registry::new();
        let (first, _rx1) = handle();
        let (second, _rx2) = handle();

        registry.register("alice", first.clone()).await;
        registry.register("alice", second.clone()).await;

        // At most one entry per identity, bound to the newest connection
        let found = registry.lookup("alice").await.unwrap();
        assert_eq!(found.id(), second.id());
        assert_eq!(registry.online_count().await, 1);

        // The replaced connection no longer owns any entry
        assert!(registry.unregister_by_connection(first.id()).await.is_none());
    }

    #[tokio::test]
    async fn test_unregister_by_connection() {
        let registry = Registry::new();
        let (alice, _rx1) = handle();
        let (bob, _rx2) = handle();

        registry.register("alice", alice.clone()).await;
        registry.register("bob", bob).await;

        let removed = registry.unregister_by_connection(alice.id()).await;
        assert_eq!(removed.as_deref(), Some("alice"));

        // Second removal for the same connection finds nothing
        assert!(registry.unregister_by_connection(alice.id()).await.is_none());
        assert_eq!(registry.snapshot().await, vec!["bob".to_string()]);
    }

    #[tokio::test]
    async fn test_snapshot_excludes_unregistered() {
        let registry = Registry::new();
        let (alice, _rx1) = handle();
        let (bob, _rx2) = handle();
        let (carol, _rx3) = handle();

        registry.register("carol", carol).await;
        registry.register("alice", alice.clone()).await;
        registry.register("bob", bob).await;

        assert_eq!(
            registry.snapshot().await,
            vec!["alice".to_string(), "bob".to_string(), "carol".to_string()]
        );

        registry.unregister_by_connection(alice.id()).await;
        assert_eq!(
            registry.snapshot().await,
            vec!["bob".to_string(), "carol".to_string()]
        );
    }

    #[tokio::test]
    async fn test_deliver_to_dead_channel_fails() {
        let (conn, rx) = handle();
        drop(rx);
        assert!(!conn.deliver(ServerEvent::PresenceUpdate { online: vec![] }));
    }
}
