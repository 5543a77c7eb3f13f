//! Session authentication for incoming connections.
//!
//! Clients attach a signed bearer token out-of-band of the message
//! protocol: as a `token` query parameter on the WebSocket upgrade
//! request, or an `Authorization: Bearer` header on HTTP routes. The
//! token is issued by the external login service; this module only
//! verifies it and extracts the stable user identity. Identity is bound
//! exclusively from the verified claim — never from anything a client
//! puts inside a protocol frame.

use jsonwebtoken::{DecodingKey, Validation};
use pinged_proto::message::UserId;
use serde::{Deserialize, Serialize};

/// Errors produced while verifying a session token.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No token was supplied with the connection attempt.
    #[error("missing session token")]
    MissingToken,

    /// The token is malformed, expired, or carries a bad signature.
    #[error("invalid session token: {0}")]
    InvalidToken(String),

    /// The token verified but its subject is not a usable user id.
    #[error("token subject is not a valid user id: {0}")]
    BadSubject(String),
}

/// JWT claims carried by a Pinged session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id as a decimal string.
    pub sub: String,
    /// Expiration time (seconds since epoch).
    pub exp: i64,
    /// Issued-at time (seconds since epoch).
    pub iat: i64,
}

/// Verifies bearer credentials and extracts the user identity.
pub struct SessionAuthenticator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionAuthenticator {
    /// Creates an authenticator for tokens signed with the given HS256
    /// shared secret.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }

    /// Verifies a token and returns the identity it is bound to.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] for signature/expiry/format
    /// failures, or [`AuthError::BadSubject`] if the subject claim does
    /// not parse as a positive integer id.
    pub fn verify(&self, token: &str) -> Result<UserId, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        let raw: i64 = data
            .claims
            .sub
            .parse()
            .map_err(|_| AuthError::BadSubject(data.claims.sub.clone()))?;
        let user_id = UserId::new(raw);
        if !user_id.is_valid() {
            return Err(AuthError::BadSubject(data.claims.sub));
        }
        Ok(user_id)
    }
}

/// Issues a signed session token. The login service owns issuance in
/// production; the gateway only needs this to exercise its own handshake
/// in tests.
#[cfg(test)]
pub(crate) fn mint_token(secret: &str, user_id: UserId, ttl_secs: i64) -> String {
    use jsonwebtoken::{EncodingKey, Header};

    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.as_i64().to_string(),
        exp: now + ttl_secs,
        iat: now,
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
