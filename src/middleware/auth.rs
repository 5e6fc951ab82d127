// Authenticated principal extracted from a validated bearer token

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authenticated user information carried in request extensions after
/// the auth middleware has validated the JWT and the session binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    pub roles: Vec<String>,
    /// Session the token is bound to; None for legacy tokens minted
    /// before session binding
    pub session_id: Option<Uuid>,
    pub jti: String,
    pub token_version: i32,
    pub exp: u64,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == "admin")
    }
}
