//! Companion HTTP surface over the same message store as the gateway.
//!
//! Three routes consumed by the wider application: conversation history,
//! the distinct set of conversation counterparts, and a REST fallback for
//! sending. The fallback persists through the identical store contract as
//! the realtime path but deliberately performs no delivery push — clients
//! on this path recover through history fetches.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use pinged_proto::message::{Message, UserId};
use serde::Deserialize;

use crate::gateway::{GatewayState, validate_send};
use crate::store::{self, MessageStore, StoreError};

/// Errors surfaced as HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or invalid bearer credential.
    #[error("{0}")]
    Unauthorized(String),

    /// Malformed request payload.
    #[error("{0}")]
    Validation(String),

    /// The referenced resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Persistence is unreachable or timed out.
    #[error("{0}")]
    Unavailable(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => Self::NotFound(e.to_string()),
            StoreError::Unavailable(_) => Self::Unavailable(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Extracts and verifies the bearer identity from request headers.
fn bearer_identity<S: MessageStore>(
    state: &GatewayState<S>,
    headers: &HeaderMap,
) -> Result<UserId, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();
    state
        .auth
        .verify(token)
        .map_err(|e| ApiError::Unauthorized(e.to_string()))
}

/// Request body for the REST send fallback.
#[derive(Debug, Deserialize)]
struct SendMessageBody {
    receiver_id: i64,
    content: String,
}

/// Routes for the companion HTTP surface.
pub fn routes<S: MessageStore>() -> axum::Router<Arc<GatewayState<S>>> {
    axum::Router::new()
        .route("/conversations", get(list_counterparts::<S>))
        .route("/conversations/{other_id}", get(get_conversation::<S>))
        .route("/messages", post(post_message::<S>))
}

/// `GET /conversations` — identities the bearer has exchanged messages with.
async fn list_counterparts<S: MessageStore>(
    State(state): State<Arc<GatewayState<S>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<UserId>>, ApiError> {
    let user = bearer_identity(&state, &headers)?;
    let others = store::bounded(state.store_timeout, state.store.counterparts(user)).await?;
    Ok(Json(others))
}

/// `GET /conversations/{other_id}` — ascending history with one user.
async fn get_conversation<S: MessageStore>(
    State(state): State<Arc<GatewayState<S>>>,
    Path(other_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Vec<Message>>, ApiError> {
    let user = bearer_identity(&state, &headers)?;
    let other = UserId::new(other_id);
    if !other.is_valid() {
        return Err(ApiError::Validation(format!("invalid user id: {other_id}")));
    }
    let history =
        store::bounded(state.store_timeout, state.store.conversation(user, other)).await?;
    Ok(Json(history))
}

/// `POST /messages` — REST fallback that persists without delivery.
async fn post_message<S: MessageStore>(
    State(state): State<Arc<GatewayState<S>>>,
    headers: HeaderMap,
    Json(body): Json<SendMessageBody>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let sender = bearer_identity(&state, &headers)?;
    let receiver = UserId::new(body.receiver_id);
    validate_send(state.max_content_bytes, receiver, &body.content).map_err(ApiError::Validation)?;

    let message = store::bounded(
        state.store_timeout,
        state.store.create(sender, receiver, body.content),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(message)))
}
