use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use postguard_core::UserId;

use crate::{Principal, Role};

/// Bearer token claims (transport-agnostic).
///
/// Timestamps are seconds since the Unix epoch, as registered JWT claims are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject / user identifier.
    pub sub: UserId,

    pub email: String,

    /// Account roles at the time the token was minted.
    pub roles: Vec<Role>,

    /// Issued-at timestamp.
    pub iat: i64,

    /// Expiration timestamp.
    pub exp: i64,
}

impl JwtClaims {
    /// Claims for a token issued at `now` that lives for `ttl`.
    pub fn for_principal(principal: &Principal, now: DateTime<Utc>, ttl: Duration) -> Result<Self, TokenValidationError> {
        let expires = now
            .checked_add_signed(ttl)
            .ok_or(TokenValidationError::ExpiryOutOfRange)?;
        Ok(Self {
            sub: principal.user_id,
            email: principal.email.clone(),
            roles: principal.roles.clone(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("token lifetime overflows the representable time range")]
    ExpiryOutOfRange,

    #[error("malformed token: {0}")]
    Malformed(String),
}

/// Deterministically validate token claims against `now`.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    let now = now.timestamp();
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

/// Decodes and validates bearer tokens.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

/// HMAC-SHA256 token codec sharing one secret for minting and validation.
#[derive(Clone)]
pub struct Hs256JwtValidator {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    pub fn issue(&self, claims: &JwtClaims) -> Result<String, TokenValidationError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        // Time checks run through `validate_claims` so they share `now` with the caller.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.decoding, &validation)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}
