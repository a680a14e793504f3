//! # Message Router
//!
//! Persist-then-deliver routing. Persistence is a precondition of
//! delivery: nothing is pushed to any connection unless the record made
//! it to the durable log first, so a message can never be delivered but
//! unsaved.

use super::registry::{ConnectionHandle, Registry};
use crate::database::repository::{MessageRepository, UserRepository};
use crate::database::DbPool;
use chrono::Utc;
use shared::{PayloadKind, ServerEvent};
use tracing::{debug, error, warn};

/// What happened to one send operation. Used by tests and logging; the
/// sender learns the outcome through its own connection events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// The record reached the durable log
    pub stored: bool,
    /// The recipient's live connection accepted the push
    pub delivered_to_recipient: bool,
}

/// Route one message: persist, touch both participants' activity, push to
/// the recipient if online, and always echo to the sender's connection
/// with the canonical server timestamp.
///
/// A persistence failure aborts the whole operation and is reported only
/// to the originating connection; it never tears down the session or
/// affects other users.
pub async fn route_message(
    db: &DbPool,
    registry: &Registry,
    sender_conn: &ConnectionHandle,
    from: &str,
    to: &str,
    payload: &str,
    kind: PayloadKind,
) -> DeliveryOutcome {
    let timestamp = Utc::now().to_rfc3339();

    let record = match MessageRepository::insert(db, from, to, payload, kind.as_str(), &timestamp)
        .await
    {
        Ok(record) => record,
        Err(e) => {
            error!(from, to, error = %e, "message persistence failed, nothing delivered");
            sender_conn.deliver(ServerEvent::SendError {
                reason: "message could not be saved".to_string(),
            });
            return DeliveryOutcome {
                stored: false,
                delivered_to_recipient: false,
            };
        }
    };

    // Recency drives the roster ordering. The message is already durable,
    // so a failed touch is logged rather than surfaced.
    for participant in [from, to] {
        if let Err(e) = UserRepository::touch_activity(db, participant, &timestamp).await {
            warn!(participant, error = %e, "failed to update last activity");
        }
    }

    let event = ServerEvent::MessageDelivered {
        from: record.sender,
        to: record.recipient,
        payload: record.body,
        kind,
        timestamp: record.timestamp,
    };

    // A registered entry whose channel is already closed counts as
    // offline: the entry is stale until disconnect cleanup purges it.
    let delivered_to_recipient = match registry.lookup(to).await {
        Some(recipient_conn) => {
            let ok = recipient_conn.deliver(event.clone());
            if !ok {
                debug!(to, "recipient connection dead, treating as offline");
            }
            ok
        }
        None => {
            debug!(to, "recipient offline, message stored only");
            false
        }
    };

    // Send confirmation: the sender's interface reflects the message with
    // the server-assigned timestamp regardless of the recipient's status.
    sender_conn.deliver(event);

    DeliveryOutcome {
        stored: true,
        delivered_to_recipient,
    }
}
