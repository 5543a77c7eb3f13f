//! Message persistence boundary.
//!
//! The gateway treats durable storage as an external collaborator behind
//! the [`MessageStore`] trait: create a message, record a read, and query
//! history. Both the realtime path and the REST fallback go through the
//! same store value, so conversation history stays consistent no matter
//! which path created a message.
//!
//! [`MemoryStore`] is the in-process implementation used by the gateway
//! binary and the test suites.

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use pinged_proto::message::{Message, MessageId, Timestamp, UserId};
use tokio::sync::RwLock;

/// Errors surfaced by the persistence boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The referenced message does not exist.
    #[error("message {0} not found")]
    NotFound(MessageId),

    /// The store is unreachable, timed out, or rejected the write.
    #[error("persistence unavailable: {0}")]
    Unavailable(String),
}

/// Contract the gateway requires of persistence, regardless of backing
/// engine. Futures are `Send` so store calls can run inside spawned
/// connection tasks.
pub trait MessageStore: Send + Sync + 'static {
    /// Persists a new message, assigning its id and creation time.
    fn create(
        &self,
        sender: UserId,
        receiver: UserId,
        content: String,
    ) -> impl Future<Output = Result<Message, StoreError>> + Send;

    /// Records a read receipt for a message on behalf of its receiver.
    ///
    /// `read_at` is set only if currently unset; a repeat call re-confirms
    /// the original timestamp rather than overwriting it. Returns the
    /// message as stored after the call. Only the message's receiver may
    /// record a read: any other `reader` gets `NotFound`, indistinguishable
    /// from a missing message, and the stored state is untouched.
    fn mark_read(
        &self,
        id: MessageId,
        reader: UserId,
        at: Timestamp,
    ) -> impl Future<Output = Result<Message, StoreError>> + Send;

    /// Returns the full history between two users, both directions,
    /// ascending by creation time. A single finite fetch, not a stream.
    fn conversation(
        &self,
        a: UserId,
        b: UserId,
    ) -> impl Future<Output = Result<Vec<Message>, StoreError>> + Send;

    /// Returns the distinct identities the user has exchanged messages
    /// with, unioning senders and receivers across their history.
    fn counterparts(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Vec<UserId>, StoreError>> + Send;
}

/// Bounds a store call with a timeout, mapping elapse to
/// [`StoreError::Unavailable`]. The gateway never waits on persistence
/// longer than the configured window.
pub async fn bounded<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, StoreError>> + Send,
) -> Result<T, StoreError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Unavailable(format!(
            "store call exceeded {} ms",
            timeout.as_millis()
        ))),
    }
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Append-only message table; appended in creation order, so it is
    /// already ascending by `created_at`.
    messages: Vec<Message>,
    next_id: i64,
    last_created_millis: u64,
}

/// In-memory message store guarded by an [`RwLock`].
///
/// Creation times are made strictly monotonic: a clock reading that does
/// not advance past the previous message is bumped by one millisecond.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageStore for MemoryStore {
    fn create(
        &self,
        sender: UserId,
        receiver: UserId,
        content: String,
    ) -> impl Future<Output = Result<Message, StoreError>> + Send {
        async move {
            let mut inner = self.inner.write().await;
            inner.next_id += 1;
            let millis = Timestamp::now()
                .as_millis()
                .max(inner.last_created_millis + 1);
            inner.last_created_millis = millis;
            let message = Message {
                id: MessageId::new(inner.next_id),
                sender_id: sender,
                receiver_id: receiver,
                content,
                created_at: Timestamp::from_millis(millis),
                read_at: None,
            };
            inner.messages.push(message.clone());
            Ok(message)
        }
    }

    fn mark_read(
        &self,
        id: MessageId,
        reader: UserId,
        at: Timestamp,
    ) -> impl Future<Output = Result<Message, StoreError>> + Send {
        async move {
            let mut inner = self.inner.write().await;
            let message = inner
                .messages
                .iter_mut()
                .find(|m| m.id == id && m.receiver_id == reader)
                .ok_or(StoreError::NotFound(id))?;
            if message.read_at.is_none() {
                message.read_at = Some(at);
            }
            Ok(message.clone())
        }
    }

    fn conversation(
        &self,
        a: UserId,
        b: UserId,
    ) -> impl Future<Output = Result<Vec<Message>, StoreError>> + Send {
        async move {
            let inner = self.inner.read().await;
            Ok(inner
                .messages
                .iter()
                .filter(|m| {
                    (m.sender_id == a && m.receiver_id == b)
                        || (m.sender_id == b && m.receiver_id == a)
                })
                .cloned()
                .collect())
        }
    }

    fn counterparts(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Vec<UserId>, StoreError>> + Send {
        async move {
            let inner = self.inner.read().await;
            let mut others = BTreeSet::new();
            for m in &inner.messages {
                if m.sender_id == user {
                    others.insert(m.receiver_id);
                } else if m.receiver_id == user {
                    others.insert(m.sender_id);
                }
            }
            Ok(others.into_iter().collect())
        }
    }
}
