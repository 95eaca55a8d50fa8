use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::auth::{claims::Claims, repo_types::UserId};
use crate::config::JwtConfig;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not match")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("failed to encode token: {0}")]
    Encode(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Malformed,
        }
    }
}

/// HS256 signing and verification keys, shared by every request.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    leeway_seconds: i64,
}

impl JwtKeys {
    pub fn new(secret: &[u8], ttl: Duration, leeway_seconds: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
            leeway_seconds,
        }
    }

    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self::new(
            cfg.secret.as_bytes(),
            Duration::seconds(cfg.ttl_minutes.saturating_mul(60)),
            cfg.leeway_seconds,
        )
    }

    /// Sign a token for `user_id` that expires `ttl` after `now`.
    pub fn mint(&self, user_id: UserId, now: OffsetDateTime) -> Result<String, TokenError> {
        let exp = now
            .checked_add(self.ttl)
            .ok_or_else(|| TokenError::Encode("expiry out of range".into()))?;
        let claims = Claims {
            id: user_id,
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))?;
        debug!(user_id, exp = claims.exp, "jwt signed");
        Ok(token)
    }

    /// Mint against the wall clock.
    pub fn issue(&self, user_id: UserId) -> Result<String, TokenError> {
        self.mint(user_id, OffsetDateTime::now_utc())
    }

    /// Check structure, signature and expiry, returning the embedded user id.
    ///
    /// Expiry is judged against `now` rather than the system clock: a token is
    /// expired once `now >= exp + leeway`.
    pub fn verify(&self, token: &str, now: OffsetDateTime) -> Result<UserId, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;

        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        let claims = data.claims;

        let deadline = claims.exp.saturating_add(self.leeway_seconds);
        if now.unix_timestamp() >= deadline {
            debug!(user_id = claims.id, exp = claims.exp, "jwt expired");
            return Err(TokenError::Expired);
        }
        debug!(user_id = claims.id, "jwt verified");
        Ok(claims.id)
    }
}
