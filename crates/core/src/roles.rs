//! Well-known role names and the closed [`Role`] enum.
//!
//! The string constants must match the `CHECK` constraint on `users.role` in
//! `20260301000001_create_users_table.sql`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_TECNICO: &str = "tecnico";
pub const ROLE_USER: &str = "user";

/// All valid role names, in descending order of privilege.
pub const VALID_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_TECNICO, ROLE_USER];

/// Role assigned to every user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Tecnico,
    User,
}

impl Role {
    /// All roles, in descending order of privilege.
    pub const ALL: [Role; 3] = [Role::Admin, Role::Tecnico, Role::User];

    /// The name stored in the database and exposed over the API.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => ROLE_ADMIN,
            Role::Tecnico => ROLE_TECNICO,
            Role::User => ROLE_USER,
        }
    }

    /// Parse a role name, rejecting anything outside [`VALID_ROLES`].
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            ROLE_ADMIN => Ok(Role::Admin),
            ROLE_TECNICO => Ok(Role::Tecnico),
            ROLE_USER => Ok(Role::User),
            other => Err(CoreError::Validation(format!(
                "Invalid role '{other}'. Must be one of: {}",
                VALID_ROLES.join(", ")
            ))),
        }
    }

    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }

    /// Admins and technicians may author problems.
    pub fn can_author(self) -> bool {
        matches!(self, Role::Admin | Role::Tecnico)
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::from_name(s)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
