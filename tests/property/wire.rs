//! Property-based wire codec tests.
//!
//! Uses proptest to verify:
//! 1. Any valid `ClientEvent` survives encode → decode round-trip.
//! 2. Any valid `ServerEvent` survives encode → decode round-trip.
//! 3. Random bytes never cause a panic in decode (returns `Err` gracefully).

use pinged_proto::codec;
use pinged_proto::event::{ClientEvent, ServerEvent};
use pinged_proto::message::{Message, MessageId, Timestamp, UserId};
use proptest::prelude::*;

// --- Strategies for protocol types ---

fn arb_user_id() -> impl Strategy<Value = UserId> {
    (1i64..1_000_000).prop_map(UserId::new)
}

fn arb_message_id() -> impl Strategy<Value = MessageId> {
    (1i64..1_000_000).prop_map(MessageId::new)
}

fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
    any::<u64>().prop_map(Timestamp::from_millis)
}

/// Non-empty content, as the gateway would have validated before persisting.
fn arb_content() -> impl Strategy<Value = String> {
    "[^\x00]{1,512}"
}

fn arb_message() -> impl Strategy<Value = Message> {
    (
        arb_message_id(),
        arb_user_id(),
        arb_user_id(),
        arb_content(),
        arb_timestamp(),
        proptest::option::of(arb_timestamp()),
    )
        .prop_map(
            |(id, sender_id, receiver_id, content, created_at, read_at)| Message {
                id,
                sender_id,
                receiver_id,
                content,
                created_at,
                read_at,
            },
        )
}

fn arb_client_event() -> impl Strategy<Value = ClientEvent> {
    prop_oneof![
        (arb_user_id(), arb_content()).prop_map(|(receiver_id, content)| ClientEvent::Send {
            receiver_id,
            content
        }),
        arb_message_id().prop_map(|message_id| ClientEvent::MarkRead { message_id }),
    ]
}

fn arb_server_event() -> impl Strategy<Value = ServerEvent> {
    prop_oneof![
        arb_user_id().prop_map(|user_id| ServerEvent::Ready { user_id }),
        arb_message().prop_map(ServerEvent::Sent),
        arb_content().prop_map(|reason| ServerEvent::SendError { reason }),
        arb_message().prop_map(ServerEvent::ReceiveMessage),
        (arb_message_id(), arb_timestamp()).prop_map(|(message_id, read_at)| {
            ServerEvent::ReadReceipt {
                message_id,
                read_at,
            }
        }),
    ]
}

// --- Properties ---

proptest! {
    #[test]
    fn client_event_round_trip(event in arb_client_event()) {
        let bytes = codec::encode_client(&event).unwrap();
        let decoded = codec::decode_client(&bytes).unwrap();
        prop_assert_eq!(event, decoded);
    }

    #[test]
    fn server_event_round_trip(event in arb_server_event()) {
        let bytes = codec::encode_server(&event).unwrap();
        let decoded = codec::decode_server(&bytes).unwrap();
        prop_assert_eq!(event, decoded);
    }

    #[test]
    fn decode_never_panics_on_garbage(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        // Either outcome is fine; what matters is no panic.
        let _ = codec::decode_client(&bytes);
        let _ = codec::decode_server(&bytes);
    }
}
