use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::{instrument, warn};

use super::dto::{ProfileEnvelope, PublicProfile};
use crate::{error::AppError, state::AppState};

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/profiles/:username", get(get_profile))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<ProfileEnvelope>, AppError> {
    let Some(user) = state.users.find_by_username(&username).await? else {
        warn!(%username, "profile lookup for unknown user");
        return Err(AppError::ProfileNotFound);
    };
    let profile = state
        .users
        .find_profile(user.id)
        .await?
        .ok_or(AppError::ProfileNotFound)?;

    Ok(Json(ProfileEnvelope {
        profile: PublicProfile::new(user, profile),
    }))
}
