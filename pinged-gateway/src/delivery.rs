//! Delivery routing: pushing a persisted message to the recipient's live
//! connections.
//!
//! Delivery is strictly additive on top of persistence — it never
//! substitutes for it. The router fires once per live handle and never
//! retries or waits for the recipient; an offline recipient is a normal
//! outcome, recoverable through a history fetch.

use pinged_proto::event::ServerEvent;
use pinged_proto::message::Message;

use crate::presence::{ConnectionId, PresenceDirectory};

/// Result of a delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// Handles the message was pushed to.
    pub delivered_to: Vec<ConnectionId>,
    /// Whether the recipient had any live connection at delivery time.
    pub recipient_online: bool,
}

/// Pushes a persisted message to every live connection of its receiver.
///
/// A handle whose channel has already closed (connection mid-teardown)
/// simply drops out of `delivered_to`; presence cleanup happens in the
/// disconnect path, not here.
pub async fn deliver(presence: &PresenceDirectory, message: &Message) -> DeliveryOutcome {
    let handles = presence.lookup(message.receiver_id).await;
    if handles.is_empty() {
        tracing::debug!(
            message_id = %message.id,
            receiver = %message.receiver_id,
            "recipient offline, no delivery"
        );
        return DeliveryOutcome {
            delivered_to: Vec::new(),
            recipient_online: false,
        };
    }

    let mut delivered_to = Vec::with_capacity(handles.len());
    for (conn, sender) in handles {
        if sender
            .send(ServerEvent::ReceiveMessage(message.clone()))
            .is_ok()
        {
            delivered_to.push(conn);
        } else {
            tracing::debug!(
                message_id = %message.id,
                conn = %conn,
                "handle closed during delivery, dropping push"
            );
        }
    }

    tracing::debug!(
        message_id = %message.id,
        receiver = %message.receiver_id,
        fanout = delivered_to.len(),
        "message delivered"
    );
    DeliveryOutcome {
        delivered_to,
        recipient_online: true,
    }
}
