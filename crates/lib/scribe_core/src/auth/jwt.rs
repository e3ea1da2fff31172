//! JWT token generation and verification.

use std::fmt;

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::models::auth::{IssuedToken, Role, TokenClaims, TokenKind};

/// Length of the ephemeral secret generated in dev mode.
const DEV_SECRET_LEN: usize = 64;

/// Token codec errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("token signature or algorithm mismatch")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("expected a {expected} token, got {actual}")]
    WrongType { expected: TokenKind, actual: TokenKind },

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token encoding failed: {0}")]
    Encode(String),

    #[error("no signing secret configured (set JWT_SECRET or AUTH_SECRET)")]
    MissingSecret,
}

/// Signs and verifies HS256 tokens with a single shared secret.
///
/// Access and refresh tokens share the key; the `type` claim keeps them from
/// being used in place of each other.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Sign a token for `user_id` expiring `ttl` from now.
    pub fn issue(
        &self,
        user_id: Uuid,
        role: Role,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<IssuedToken, CodecError> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| CodecError::Encode("token lifetime out of range".into()))?;
        let claims = TokenClaims {
            sub: user_id,
            role,
            kind,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Verify signature, expiry and type tag, returning the claims.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<TokenClaims, CodecError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        let claims = decode::<TokenClaims>(token, &self.decoding, &validation)
            .map_err(|e| match e.kind() {
                JwtErrorKind::ExpiredSignature => CodecError::Expired,
                JwtErrorKind::InvalidSignature | JwtErrorKind::InvalidAlgorithm => {
                    CodecError::InvalidSignature
                }
                _ => CodecError::Malformed(e.to_string()),
            })?
            .claims;

        if claims.kind != expected {
            return Err(CodecError::WrongType {
                expected,
                actual: claims.kind,
            });
        }
        Ok(claims)
    }
}

/// Resolve the signing secret: `JWT_SECRET` → `AUTH_SECRET` → (dev mode only)
/// a random ephemeral secret.
pub fn resolve_jwt_secret(dev_mode: bool) -> Result<String, CodecError> {
    resolve_secret_with(|name| std::env::var(name).ok(), dev_mode)
}

/// [`resolve_jwt_secret`] over an arbitrary variable lookup.
pub fn resolve_secret_with(
    lookup: impl Fn(&str) -> Option<String>,
    dev_mode: bool,
) -> Result<String, CodecError> {
    for name in ["JWT_SECRET", "AUTH_SECRET"] {
        if let Some(secret) = lookup(name)
            && !secret.trim().is_empty()
        {
            return Ok(secret);
        }
    }
    if !dev_mode {
        return Err(CodecError::MissingSecret);
    }
    warn!("no JWT secret configured, using an ephemeral dev secret; tokens die with the process");
    Ok(rng()
        .sample_iter(&Alphanumeric)
        .take(DEV_SECRET_LEN)
        .map(char::from)
        .collect())
}
