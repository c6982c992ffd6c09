//! User entity model and DTOs.

use serde::Serialize;
use sqlx::FromRow;
use tecwiki_core::error::CoreError;
use tecwiki_core::roles::Role;
use tecwiki_core::types::{DbId, Timestamp};

/// Full user row from the `users` table.
///
/// Contains the password hash -- NEVER serialize this to API responses directly.
/// Use [`UserResponse`] for external-facing output.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    /// Parse the stored role name.
    ///
    /// The `CHECK` constraint on `users.role` makes a failure here a sign of
    /// schema drift, so it surfaces as an internal error.
    pub fn role(&self) -> Result<Role, CoreError> {
        Role::from_name(&self.role).map_err(|_| {
            CoreError::Internal(format!("User {} has unknown role '{}'", self.id, self.role))
        })
    }
}

/// Safe user representation for API responses (no password hash).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserResponse {
    pub id: DbId,
    pub username: String,
    pub role: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role.clone(),
        }
    }
}

/// DTO for creating a new user. The password must already be hashed.
#[derive(Debug)]
pub struct CreateUser {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

/// DTO for updating an existing user. All fields are optional.
#[derive(Debug, Default)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
}
