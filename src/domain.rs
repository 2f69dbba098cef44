use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

use crate::auth::generate_token_hash;

/// Stored credential record
///
/// `token_hash` is the per-user secret that refresh tokens are bound to;
/// rotating it (`Repository::rotate_token_hash`, `update_password`) revokes every
/// outstanding refresh token for the user.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub username: String,
    pub token_hash: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a new, unverified user with a fresh token hash
    pub fn new(email: String, password_hash: String, username: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            username,
            token_hash: generate_token_hash(),
            is_verified: false,
            created_at: now,
            updated_at: now,
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("username", &self.username)
            .field("is_verified", &self.is_verified)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish_non_exhaustive()
    }
}
