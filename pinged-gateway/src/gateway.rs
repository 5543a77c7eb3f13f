//! Gateway core: shared state, WebSocket handler, and the messaging
//! protocol's state transitions.
//!
//! A connection arrives with a session token on the upgrade request. The
//! token is verified before the upgrade completes; only then is the
//! identity registered in the presence directory. Every `Send` is
//! persisted before any delivery push, so a message the recipient sees is
//! always retrievable from history. On disconnect the connection's handle
//! is removed immediately, and later deliveries correctly see it as gone.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use pinged_proto::codec;
use pinged_proto::event::{ClientEvent, ServerEvent};
use pinged_proto::message::{MessageId, Timestamp, UserId};
use tokio::sync::mpsc;

use crate::auth::SessionAuthenticator;
use crate::config::GatewayConfig;
use crate::delivery;
use crate::http;
use crate::presence::{ConnectionId, EventSender, PresenceDirectory};
use crate::store::{self, MemoryStore, MessageStore};

/// Shared gateway state: presence directory, message store, authenticator,
/// and protocol limits.
pub struct GatewayState<S> {
    /// Live-connection registry, the only shared mutable in-process state.
    pub presence: PresenceDirectory,
    /// Persistence boundary shared by the realtime and REST paths.
    pub store: S,
    /// Verifier for session tokens on both surfaces.
    pub auth: SessionAuthenticator,
    /// Maximum accepted message content size in bytes.
    pub max_content_bytes: usize,
    /// Upper bound for a single store call.
    pub store_timeout: Duration,
}

impl<S: MessageStore> GatewayState<S> {
    /// Creates gateway state with default limits.
    #[must_use]
    pub fn new(store: S, auth: SessionAuthenticator) -> Self {
        Self {
            presence: PresenceDirectory::new(),
            store,
            auth,
            max_content_bytes: GatewayConfig::DEFAULT_MAX_CONTENT_BYTES,
            store_timeout: Duration::from_secs(GatewayConfig::DEFAULT_STORE_TIMEOUT_SECS),
        }
    }

    /// Creates gateway state with limits taken from a resolved config.
    #[must_use]
    pub fn with_config(store: S, config: &GatewayConfig) -> Self {
        Self {
            presence: PresenceDirectory::new(),
            store,
            auth: SessionAuthenticator::new(&config.jwt_secret),
            max_content_bytes: config.max_content_bytes,
            store_timeout: Duration::from_secs(config.store_timeout_secs),
        }
    }
}

/// Query parameters accepted on the `/ws` upgrade request.
#[derive(Debug, serde::Deserialize)]
struct WsParams {
    token: Option<String>,
}

/// axum handler that authenticates and upgrades a WebSocket connection.
///
/// Verification happens before the upgrade: a bad token is refused with
/// 401 and never touches the presence directory.
async fn ws_handler<S: MessageStore>(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<Arc<GatewayState<S>>>,
) -> Response {
    match state.auth.verify(params.token.as_deref().unwrap_or_default()) {
        Ok(user_id) => ws.on_upgrade(move |socket| handle_socket(socket, state, user_id)),
        Err(e) => {
            tracing::warn!(error = %e, "rejected unauthenticated connection");
            (StatusCode::UNAUTHORIZED, e.to_string()).into_response()
        }
    }
}

/// Handles an upgraded WebSocket connection for one authenticated user.
///
/// The connection lifecycle:
/// 1. Mint a connection handle and register it in the presence directory.
/// 2. Push `Ready` with the bound identity.
/// 3. Run the read loop, handling `Send` and `MarkRead` events in order.
/// 4. On disconnect, unregister the handle.
pub async fn handle_socket<S: MessageStore>(
    socket: WebSocket,
    state: Arc<GatewayState<S>>,
    user_id: UserId,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let conn = ConnectionId::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    state.presence.register(user_id, conn, tx.clone()).await;
    tracing::info!(user = %user_id, conn = %conn, "connection registered");

    // Buffered until the writer task starts; always the first event seen.
    let _ = tx.send(ServerEvent::Ready { user_id });

    // Writer task: encode events from the channel into binary frames.
    let writer_user = user_id;
    let mut write_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let bytes = match codec::encode_server(&event) {
                Ok(b) => b,
                Err(e) => {
                    tracing::error!(user = %writer_user, error = %e, "failed to encode event");
                    continue;
                }
            };
            if ws_sender.send(WsMessage::Binary(bytes.into())).await.is_err() {
                tracing::debug!(user = %writer_user, "WebSocket write failed");
                break;
            }
        }
    });

    // Reader loop: events from one connection are handled strictly in
    // order; the store call for one event completes before the next event
    // is read. Other connections' events interleave freely.
    let reader_state = Arc::clone(&state);
    let reader_tx = tx;
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(frame)) = ws_receiver.next().await {
            match frame {
                WsMessage::Binary(data) => {
                    handle_client_frame(user_id, &data, &reader_state, &reader_tx).await;
                }
                WsMessage::Close(_) => {
                    tracing::info!(user = %user_id, "received close frame");
                    break;
                }
                _ => {
                    // Ignore text, ping, pong frames.
                }
            }
        }
    });

    // Wait for either task to finish, then abort the other.
    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    // Presence removal runs immediately; in-flight store operations finish
    // on their own and any push toward this handle is simply dropped.
    state.presence.unregister(conn).await;
    tracing::info!(user = %user_id, conn = %conn, "connection closed and unregistered");
}

/// Decodes and dispatches one binary frame from an authenticated client.
async fn handle_client_frame<S: MessageStore>(
    user_id: UserId,
    data: &[u8],
    state: &Arc<GatewayState<S>>,
    reply: &EventSender,
) {
    let event = match codec::decode_client(data) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(user = %user_id, error = %e, "failed to decode client frame");
            return;
        }
    };

    match event {
        ClientEvent::Send {
            receiver_id,
            content,
        } => {
            handle_send(state, user_id, receiver_id, content, reply).await;
        }
        ClientEvent::MarkRead { message_id } => {
            handle_mark_read(state, user_id, message_id).await;
        }
    }
}

/// Validates a send payload before anything touches the store. Shared
/// with the REST fallback so both paths enforce the same rules.
pub(crate) fn validate_send(
    max_content_bytes: usize,
    receiver_id: UserId,
    content: &str,
) -> Result<(), String> {
    if content.trim().is_empty() {
        return Err("message content must not be empty".to_string());
    }
    if content.len() > max_content_bytes {
        return Err(format!(
            "content too large: {} bytes (max {max_content_bytes})",
            content.len()
        ));
    }
    if !receiver_id.is_valid() {
        return Err(format!("invalid receiver id: {receiver_id}"));
    }
    Ok(())
}

/// Handles a `Send` event: validate, persist, deliver, acknowledge.
///
/// Persistence strictly precedes delivery — a store failure means no
/// recipient ever sees the message, only a `SendError` to the sender.
async fn handle_send<S: MessageStore>(
    state: &Arc<GatewayState<S>>,
    sender_id: UserId,
    receiver_id: UserId,
    content: String,
    reply: &EventSender,
) {
    if let Err(reason) = validate_send(state.max_content_bytes, receiver_id, &content) {
        tracing::debug!(user = %sender_id, reason = %reason, "send rejected");
        let _ = reply.send(ServerEvent::SendError { reason });
        return;
    }

    let created = store::bounded(
        state.store_timeout,
        state.store.create(sender_id, receiver_id, content),
    )
    .await;

    match created {
        Ok(message) => {
            let outcome = delivery::deliver(&state.presence, &message).await;
            tracing::debug!(
                message_id = %message.id,
                from = %sender_id,
                to = %receiver_id,
                recipient_online = outcome.recipient_online,
                fanout = outcome.delivered_to.len(),
                "message persisted and routed"
            );
            let _ = reply.send(ServerEvent::Sent(message));
        }
        Err(e) => {
            tracing::warn!(
                from = %sender_id,
                to = %receiver_id,
                error = %e,
                "persistence failed, delivery skipped"
            );
            let _ = reply.send(ServerEvent::SendError {
                reason: e.to_string(),
            });
        }
    }
}

/// Handles a `MarkRead` event: record the read, then push a best-effort
/// receipt to every live connection of the original sender.
///
/// The read is recorded under the connection's authenticated identity, so
/// only the message's receiver can set `read_at` or cause a receipt; for
/// anyone else the id does not resolve. Failures never surface to the
/// reader — unknown ids and store errors are logged and swallowed.
async fn handle_mark_read<S: MessageStore>(
    state: &Arc<GatewayState<S>>,
    reader_id: UserId,
    message_id: MessageId,
) {
    let updated = store::bounded(
        state.store_timeout,
        state.store.mark_read(message_id, reader_id, Timestamp::now()),
    )
    .await;

    let message = match updated {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(
                reader = %reader_id,
                message_id = %message_id,
                error = %e,
                "read receipt dropped"
            );
            return;
        }
    };

    let Some(read_at) = message.read_at else {
        return;
    };
    for (_, sender) in state.presence.lookup(message.sender_id).await {
        let _ = sender.send(ServerEvent::ReadReceipt {
            message_id,
            read_at,
        });
    }
}

/// Builds the full gateway router: the `/ws` upgrade route plus the
/// companion HTTP surface, all over one shared state.
pub fn router<S: MessageStore>(state: Arc<GatewayState<S>>) -> axum::Router {
    axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler::<S>))
        .merge(http::routes::<S>())
        .with_state(state)
}

/// Starts the gateway on the given address with an in-memory store and
/// the given token secret, returning the bound address and a join handle.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
    jwt_secret: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let state = Arc::new(GatewayState::new(
        MemoryStore::new(),
        SessionAuthenticator::new(jwt_secret),
    ));
    start_server_with_state(addr, state).await
}

/// Starts the gateway with pre-configured [`GatewayState`].
///
/// This is the primary entry point used by both `main.rs` and test code.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state<S: MessageStore>(
    addr: &str,
    state: Arc<GatewayState<S>>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "gateway server error");
        }
    });

    Ok((bound_addr, handle))
}

#[cfg(test)]
pub(crate) const TEST_SECRET: &str = "gateway-test-secret-0123456789abcdef";

/// Starts the gateway in-process for testing.
///
/// Binds to `127.0.0.1:0` (OS-assigned port) and returns the bound
/// address, the shared state for inspection, and a join handle.
#[cfg(test)]
pub(crate) async fn start_test_server() -> (
    std::net::SocketAddr,
    Arc<GatewayState<MemoryStore>>,
    tokio::task::JoinHandle<()>,
) {
    let state = Arc::new(GatewayState::new(
        MemoryStore::new(),
        SessionAuthenticator::new(TEST_SECRET),
    ));
    let (addr, handle) = start_server_with_state("127.0.0.1:0", Arc::clone(&state))
        .await
        .expect("failed to start test server");
    (addr, state, handle)
}
