use serde::{Deserialize, Serialize};

use crate::auth::repo_types::UserId;

/// JWT payload used for authentication. Only `id` and `exp` are required on
/// the wire; tokens minted here also carry `iat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub id: UserId, // user ID
    #[serde(default)]
    pub iat: i64, // issued at (unix timestamp)
    pub exp: i64, // expires at (unix timestamp)
}
