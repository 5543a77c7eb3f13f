//! In-memory directory of which users currently have open connections.
//!
//! The directory is the gateway's only shared mutable state. It maps each
//! authenticated identity to the set of its live connection handles — a
//! user signed in from several devices holds several entries, and a
//! message addressed to them fans out to all of them. Entries are
//! ephemeral: nothing is persisted, and a process restart starts from an
//! empty directory.

use std::collections::HashMap;

use pinged_proto::event::ServerEvent;
use pinged_proto::message::UserId;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

/// Opaque handle identifying one live connection, used as a fan-out
/// target. Uuid v7 keeps handles unique across reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Mints a fresh handle for a newly accepted connection.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Channel through which events are pushed to one connection's writer task.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Registry of live connections per user identity.
///
/// All three operations take the lock exactly once, so a lookup never
/// observes a half-updated handle set.
pub struct PresenceDirectory {
    entries: RwLock<HashMap<UserId, HashMap<ConnectionId, EventSender>>>,
}

impl Default for PresenceDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Adds a connection handle to the identity's set.
    ///
    /// Idempotent for a repeated `(user, conn)` pair: the sender is simply
    /// replaced. Other handles of the same user are untouched.
    pub async fn register(&self, user: UserId, conn: ConnectionId, sender: EventSender) {
        let mut entries = self.entries.write().await;
        entries.entry(user).or_default().insert(conn, sender);
    }

    /// Removes a connection handle from whichever identity holds it.
    ///
    /// Drops the identity's entry entirely once its last handle is gone.
    /// Unknown handles are a no-op. Returns the identity the handle
    /// belonged to, if any.
    pub async fn unregister(&self, conn: ConnectionId) -> Option<UserId> {
        let mut entries = self.entries.write().await;
        let user = entries
            .iter()
            .find(|(_, handles)| handles.contains_key(&conn))
            .map(|(user, _)| *user)?;
        if let Some(handles) = entries.get_mut(&user) {
            handles.remove(&conn);
            if handles.is_empty() {
                entries.remove(&user);
            }
        }
        Some(user)
    }

    /// Returns the live handles for an identity.
    ///
    /// An empty vec means the user is offline — the common case, not an
    /// error.
    pub async fn lookup(&self, user: UserId) -> Vec<(ConnectionId, EventSender)> {
        let entries = self.entries.read().await;
        entries.get(&user).map_or_else(Vec::new, |handles| {
            handles
                .iter()
                .map(|(conn, sender)| (*conn, sender.clone()))
                .collect()
        })
    }

    /// Whether the identity has at least one live connection.
    pub async fn is_online(&self, user: UserId) -> bool {
        let entries = self.entries.read().await;
        entries.contains_key(&user)
    }
}
