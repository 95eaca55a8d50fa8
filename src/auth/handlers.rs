use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        backend::CurrentUser,
        dto::{AuthResponse, LoginRequest, RegisterRequest, UpdateUserRequest, UserDetails, UserEnvelope},
        extractors::{extract_json, AuthUser},
        services::{login_user, register_user, update_user},
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/users/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/user", get(get_me).put(update_me))
}

#[instrument(skip(state, body))]
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<UserEnvelope<RegisterRequest>>, JsonRejection>,
) -> Result<(StatusCode, Json<UserEnvelope<AuthResponse>>), AppError> {
    let payload = extract_json(body)?;
    let (user, _) = register_user(state.users.as_ref(), payload.user).await?;
    let token = state.jwt.issue(user.id).context("jwt sign")?;
    Ok((
        StatusCode::CREATED,
        Json(UserEnvelope {
            user: AuthResponse::new(user, token),
        }),
    ))
}

#[instrument(skip(state, body))]
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<UserEnvelope<LoginRequest>>, JsonRejection>,
) -> Result<Json<UserEnvelope<AuthResponse>>, AppError> {
    let payload = extract_json(body)?;
    let user = login_user(state.users.as_ref(), payload.user).await?;
    let token = state.jwt.issue(user.id).context("jwt sign")?;
    Ok(Json(UserEnvelope {
        user: AuthResponse::new(user, token),
    }))
}

#[instrument(skip(state, current))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(current): AuthUser,
) -> Result<Json<UserEnvelope<UserDetails>>, AppError> {
    let CurrentUser { user, token } = current;
    let profile = state
        .users
        .find_profile(user.id)
        .await?
        .with_context(|| format!("user {} has no profile", user.id))?;
    Ok(Json(UserEnvelope {
        user: UserDetails::new(user, profile, token),
    }))
}

#[instrument(skip(state, current, body))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(current): AuthUser,
    body: Result<Json<UserEnvelope<UpdateUserRequest>>, JsonRejection>,
) -> Result<Json<UserEnvelope<UserDetails>>, AppError> {
    let CurrentUser { user, token } = current;
    let payload = extract_json(body)?;
    let (user, profile) = update_user(state.users.as_ref(), &user, payload.user).await?;
    Ok(Json(UserEnvelope {
        user: UserDetails::new(user, profile, token),
    }))
}
