use serde::Serialize;

use crate::auth::repo_types::{Profile, User};

#[derive(Debug, Serialize)]
pub struct ProfileEnvelope {
    pub profile: PublicProfile,
}

/// What anyone may see about a user.
#[derive(Debug, Serialize)]
pub struct PublicProfile {
    pub username: String,
    pub bio: String,
    pub image: String,
}

impl PublicProfile {
    pub fn new(user: User, profile: Profile) -> Self {
        Self {
            username: user.username,
            bio: profile.bio,
            image: profile.image,
        }
    }
}
