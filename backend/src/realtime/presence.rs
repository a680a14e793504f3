//! # Presence Broadcaster
//!
//! On every registry mutation the full online-user set is pushed to every
//! connected party. Full-state rather than delta: O(n^2) total volume as
//! users churn, acceptable at small-group scale and much simpler to
//! reason about.

use super::registry::Registry;
use shared::ServerEvent;
use tracing::debug;

/// Deliver the current online-user list to every registered connection.
///
/// A failed delivery means the connection died between snapshot and send;
/// its entry will be purged by the disconnect cleanup, so it is only
/// logged here.
pub async fn broadcast_presence(registry: &Registry) {
    let (online, handles) = registry.presence_view().await;

    debug!(online = ?online, recipients = handles.len(), "broadcasting presence");

    let event = ServerEvent::PresenceUpdate { online };
    for handle in handles {
        if !handle.deliver(event.clone()) {
            debug!(connection = %handle.id(), "presence delivery to dead connection skipped");
        }
    }
}
