use crate::state::AppState;
use axum::Router;

pub mod backend;
mod claims;
mod dto;
pub(crate) mod extractors;
pub mod handlers;
pub mod jwt;
#[cfg(test)]
pub mod memory;
mod password;
pub mod repo;
pub mod repo_types;
mod services;

pub use backend::{AuthError, TokenAuthenticator};
pub use extractors::authenticate;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
}
