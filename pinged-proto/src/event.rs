//! Gateway wire events, postcard-encoded into WebSocket binary frames.
//!
//! The protocol is intentionally small: a connection is authenticated
//! during the HTTP upgrade (the token never travels inside a frame), the
//! server confirms the bound identity with [`ServerEvent::Ready`], and
//! from then on the client only ever sends messages or read receipts.

use serde::{Deserialize, Serialize};

use crate::message::{Message, MessageId, Timestamp, UserId};

/// Events sent from a connected client to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientEvent {
    /// Send a direct message to another user.
    ///
    /// The sender is always the connection's authenticated identity; there
    /// is deliberately no sender field to spoof.
    Send {
        /// Identity of the intended recipient.
        receiver_id: UserId,
        /// Message body; must be non-empty.
        content: String,
    },

    /// Record that the client has read a message addressed to it.
    ///
    /// Best-effort: unknown ids, and ids of messages not addressed to
    /// this connection's identity, are logged server-side and ignored; a
    /// repeat for an already-read message re-confirms the original time.
    MarkRead {
        /// Id of the message that was read.
        message_id: MessageId,
    },
}

/// Events pushed from the gateway to a connected client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerEvent {
    /// First event on every connection: the identity the gateway bound
    /// from the verified session token.
    Ready {
        /// The authenticated user id for this connection.
        user_id: UserId,
    },

    /// Acknowledges a successful `Send` with the persisted message,
    /// including its store-assigned id and creation time.
    Sent(Message),

    /// A `Send` was rejected; nothing was persisted or delivered.
    SendError {
        /// Human-readable rejection reason.
        reason: String,
    },

    /// A message addressed to this connection's identity. Pushed to every
    /// live connection of the recipient.
    ReceiveMessage(Message),

    /// A message this identity sent has been read by its recipient.
    ReadReceipt {
        /// Id of the message that was read.
        message_id: MessageId,
        /// When the read was recorded by the store.
        read_at: Timestamp,
    },
}
