use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
    Json,
};
use time::OffsetDateTime;

use super::backend::CurrentUser;
use crate::error::{AppError, NOT_AUTHENTICATED};
use crate::state::AppState;

/// Runs the token authenticator on every request.
///
/// A resolved user lands in the request extensions, an absent or foreign
/// credential lets the request through anonymously, and a rejected `Token`
/// credential ends the request with 401.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(str::to_owned);

    let resolved = state
        .authenticator
        .resolve(header.as_deref(), OffsetDateTime::now_utc())
        .await?;

    if let Some(current) = resolved {
        request.extensions_mut().insert(current);
    }
    Ok(next.run(request).await)
}

/// Requires an authenticated user.
pub struct AuthUser(pub CurrentUser);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthorized(NOT_AUTHENTICATED.into()))
    }
}

/// Unwrap a JSON body, turning axum's plain-text rejection into an `{"errors": ...}` 400.
pub fn extract_json<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value).map_err(AppError::from)
}
