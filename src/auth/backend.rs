//! Resolves an `Authorization: Token <jwt>` header to a user.
//!
//! Three outcomes: `Ok(Some(_))` for an authenticated user, `Ok(None)` when no
//! usable credential was presented (the request continues anonymously), and
//! `Err(_)` when a credential was presented under the right scheme but was
//! rejected.

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::auth::jwt::{JwtKeys, TokenError};
use crate::auth::repo::UserStore;
use crate::auth::repo_types::User;

/// Scheme name expected in front of the token, compared case-insensitively.
pub const AUTH_SCHEME: &str = "Token";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid authentication. Could not decode token.")]
    InvalidToken(TokenError),
    #[error("No user matching this token was found.")]
    UserNotFound,
    #[error("This user has been deactivated.")]
    Deactivated,
    #[error("failed to load user: {0}")]
    Store(anyhow::Error),
}

/// The user a request acts for, plus the raw token it presented.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

/// Pull the credential out of an `Authorization` header value.
///
/// Returns `None` for a missing or empty header, a lone word, more than two
/// words, or a scheme other than `Token`.
pub fn presented_token(header: Option<&str>) -> Option<&str> {
    let mut parts = header?.split_ascii_whitespace();
    let scheme = parts.next()?;
    let token = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    scheme.eq_ignore_ascii_case(AUTH_SCHEME).then_some(token)
}

#[derive(Clone)]
pub struct TokenAuthenticator {
    keys: JwtKeys,
    users: Arc<dyn UserStore>,
}

impl TokenAuthenticator {
    pub fn new(keys: JwtKeys, users: Arc<dyn UserStore>) -> Self {
        Self { keys, users }
    }

    pub async fn resolve(
        &self,
        header: Option<&str>,
        now: OffsetDateTime,
    ) -> Result<Option<CurrentUser>, AuthError> {
        let Some(token) = presented_token(header) else {
            debug!("no token credential presented");
            return Ok(None);
        };
        self.authenticate_credentials(token, now).await.map(Some)
    }

    async fn authenticate_credentials(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<CurrentUser, AuthError> {
        let user_id = self.keys.verify(token, now).map_err(|e| {
            warn!(reason = %e, "token rejected");
            AuthError::InvalidToken(e)
        })?;

        let user = self
            .users
            .find_by_id(user_id)
            .await
            .map_err(AuthError::Store)?
            .ok_or_else(|| {
                warn!(user_id, "token subject does not exist");
                AuthError::UserNotFound
            })?;

        if !user.is_active {
            warn!(user_id, "token for deactivated user");
            return Err(AuthError::Deactivated);
        }

        Ok(CurrentUser {
            user,
            token: token.to_owned(),
        })
    }
}
