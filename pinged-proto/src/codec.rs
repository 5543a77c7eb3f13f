//! Serialization for the Pinged wire protocol.
//!
//! Events travel as postcard-encoded WebSocket binary frames; the
//! transport preserves frame boundaries, so no additional framing is
//! layered on top.

use crate::event::{ClientEvent, ServerEvent};

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Encodes a [`ClientEvent`] into a byte vector using postcard.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the event cannot be serialized.
pub fn encode_client(event: &ClientEvent) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(event).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a [`ClientEvent`] from a byte slice using postcard.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the bytes cannot be deserialized.
pub fn decode_client(bytes: &[u8]) -> Result<ClientEvent, CodecError> {
    postcard::from_bytes(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Encodes a [`ServerEvent`] into a byte vector using postcard.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the event cannot be serialized.
pub fn encode_server(event: &ServerEvent) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(event).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a [`ServerEvent`] from a byte slice using postcard.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the bytes cannot be deserialized.
pub fn decode_server(bytes: &[u8]) -> Result<ServerEvent, CodecError> {
    postcard::from_bytes(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Message, MessageId, Timestamp, UserId};

    fn sample_message() -> Message {
        Message {
            id: MessageId::new(1),
            sender_id: UserId::new(1),
            receiver_id: UserId::new(2),
            content: "hello".to_string(),
            created_at: Timestamp::from_millis(1_700_000_000_000),
            read_at: None,
        }
    }

    #[test]
    fn client_send_round_trip() {
        let event = ClientEvent::Send {
            receiver_id: UserId::new(2),
            content: "hello".to_string(),
        };
        let bytes = encode_client(&event).unwrap();
        assert_eq!(decode_client(&bytes).unwrap(), event);
    }

    #[test]
    fn server_receive_message_round_trip() {
        let event = ServerEvent::ReceiveMessage(sample_message());
        let bytes = encode_server(&event).unwrap();
        assert_eq!(decode_server(&bytes).unwrap(), event);
    }

    #[test]
    fn read_receipt_preserves_timestamp() {
        let event = ServerEvent::ReadReceipt {
            message_id: MessageId::new(5),
            read_at: Timestamp::from_millis(42),
        };
        let bytes = encode_server(&event).unwrap();
        assert_eq!(decode_server(&bytes).unwrap(), event);
    }

    #[test]
    fn decode_corrupted_bytes_fails() {
        assert!(decode_client(&[0xFF, 0xFE, 0xFD, 0xFC]).is_err());
        assert!(decode_server(&[0xFF, 0xFE, 0xFD, 0xFC]).is_err());
    }

    #[test]
    fn decode_empty_bytes_fails() {
        assert!(decode_client(&[]).is_err());
        assert!(decode_server(&[]).is_err());
    }
}
