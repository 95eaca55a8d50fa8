use serde::{Deserialize, Serialize};

use crate::auth::repo_types::{Profile, User};

/// `{"user": ...}` wrapper used by every request and response in this module.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserEnvelope<T> {
    pub user: T,
}

/// Request body for user registration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Request body for login.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Request body for `PUT /user`. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
}

/// Returned after registration and login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub email: String,
    pub username: String,
    pub token: String,
}

impl AuthResponse {
    pub fn new(user: User, token: String) -> Self {
        Self {
            email: user.email,
            username: user.username,
            token,
        }
    }
}

/// The authenticated user's own view of their account.
#[derive(Debug, Serialize)]
pub struct UserDetails {
    pub email: String,
    pub username: String,
    pub token: String,
    pub bio: String,
    pub image: String,
}

impl UserDetails {
    pub fn new(user: User, profile: Profile, token: String) -> Self {
        Self {
            email: user.email,
            username: user.username,
            token,
            bio: profile.bio,
            image: profile.image,
        }
    }
}
