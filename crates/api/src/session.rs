//! Session token validation.
//!
//! Sessions arrive as bearer tokens. The validator turns a raw token into a
//! [`Session`] or a domain error; expiry is NOT checked here so callers can
//! evaluate it against their own clock.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use memberhub_auth::{AccessLevel, Session};
use memberhub_core::{ActorId, AuthenticationReason, DomainError, DomainResult, SessionId};

/// Validates bearer tokens into sessions.
#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// Invalid or malformed tokens fail with
    /// [`DomainError::Authentication`]; validator backend failures fail with
    /// [`DomainError::SessionValidation`].
    async fn validate(&self, token: &str) -> DomainResult<Session>;
}

/// Claims carried by an HS256 session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionTokenClaims {
    /// Session id.
    pub sid: String,
    /// User id.
    pub sub: String,
    pub email: String,
    pub name: String,
    /// Legacy numeric access level code (0..=3).
    pub level: i64,
    /// Expiry as unix seconds.
    pub exp: i64,
}

impl SessionTokenClaims {
    fn expires_at(&self) -> DomainResult<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .ok_or(DomainError::Authentication(AuthenticationReason::Invalid))
    }
}

/// HS256 session validator backed by a shared secret.
pub struct Hs256SessionValidator {
    decoding_key: DecodingKey,
}

impl Hs256SessionValidator {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret),
        }
    }
}

#[async_trait]
impl SessionValidator for Hs256SessionValidator {
    async fn validate(&self, token: &str) -> DomainResult<Session> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is evaluated by the authorization layer against the
        // request clock, not at decode time.
        validation.validate_exp = false;

        let data = decode::<SessionTokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|err| {
                tracing::debug!(error = %err, "session token rejected");
                DomainError::Authentication(AuthenticationReason::Invalid)
            })?;

        let claims = data.claims;
        let expires_at = claims.expires_at()?;
        Ok(Session {
            session_id: SessionId::new(claims.sid),
            user_id: ActorId::new(claims.sub),
            email: claims.email,
            display_name: claims.name,
            access_level: AccessLevel::from_legacy_code(claims.level),
            expires_at,
        })
    }
}
