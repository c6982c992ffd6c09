//! Credential store: account creation, credential checks and credential
//! changes on top of [`UserRepo`].
//!
//! Every mutation validates its input (username shape and uniqueness,
//! password length, role membership) before anything is written.

use sqlx::PgPool;
use tecwiki_core::error::CoreError;
use tecwiki_core::roles::Role;
use tecwiki_core::types::DbId;
use tecwiki_db::models::user::{CreateUser, UpdateUser, User};
use tecwiki_db::repositories::UserRepo;

use crate::auth::password::{
    hash_password, validate_password_strength, verify_dummy, verify_password,
};
use crate::error::{AppError, AppResult};

/// Maximum username length (characters), matching the database constraint.
pub const MAX_USERNAME_LEN: usize = 80;

/// Requested credential changes. `None` leaves a field untouched.
#[derive(Debug, Default, Clone)]
pub struct CredentialChanges {
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

/// Provides credential operations for users.
pub struct CredentialStore;

impl CredentialStore {
    /// Check a username/password pair.
    ///
    /// Returns `None` for an unknown username and for a wrong password
    /// alike. An unknown username still pays for one hash verification.
    pub async fn verify(pool: &PgPool, username: &str, password: &str) -> AppResult<Option<User>> {
        let Some(user) = UserRepo::find_by_username(pool, username).await? else {
            verify_dummy(password);
            return Ok(None);
        };

        let valid = verify_password(password, &user.password_hash)
            .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
        Ok(valid.then_some(user))
    }

    /// Create an account with a hashed password.
    pub async fn create(
        pool: &PgPool,
        username: &str,
        password: &str,
        role: &str,
    ) -> AppResult<User> {
        let input = Self::prepare_new(pool, username, password, role).await?;
        Ok(UserRepo::create(pool, &input).await?)
    }

    /// Validate a new account and hash its password without writing it.
    pub async fn prepare_new(
        pool: &PgPool,
        username: &str,
        password: &str,
        role: &str,
    ) -> AppResult<CreateUser> {
        let role = Role::from_name(role)?;
        let username = validate_username(username)?;
        ensure_username_free(pool, &username, None).await?;
        validate_password_strength(password)?;

        Ok(CreateUser {
            username,
            password_hash: hash(password)?,
            role,
        })
    }

    /// Apply `changes` to user `id` in a single write.
    pub async fn update(pool: &PgPool, id: DbId, changes: &CredentialChanges) -> AppResult<User> {
        let input = Self::prepare_changes(pool, id, changes).await?;
        UserRepo::update(pool, id, &input)
            .await?
            .ok_or(AppError::Core(CoreError::NotFound { entity: "User", id }))
    }

    /// Validate `changes` for user `id` and hash a new password without
    /// writing anything.
    pub async fn prepare_changes(
        pool: &PgPool,
        id: DbId,
        changes: &CredentialChanges,
    ) -> AppResult<UpdateUser> {
        let role = changes.role.as_deref().map(Role::from_name).transpose()?;
        let username = match changes.username.as_deref() {
            Some(name) => {
                let name = validate_username(name)?;
                ensure_username_free(pool, &name, Some(id)).await?;
                Some(name)
            }
            None => None,
        };
        let password_hash = match changes.password.as_deref() {
            Some(password) => {
                validate_password_strength(password)?;
                Some(hash(password)?)
            }
            None => None,
        };

        Ok(UpdateUser {
            username,
            password_hash,
            role,
        })
    }

    pub async fn set_username(pool: &PgPool, id: DbId, username: &str) -> AppResult<User> {
        let changes = CredentialChanges {
            username: Some(username.to_string()),
            ..Default::default()
        };
        Self::update(pool, id, &changes).await
    }

    pub async fn set_password(pool: &PgPool, id: DbId, password: &str) -> AppResult<User> {
        let changes = CredentialChanges {
            password: Some(password.to_string()),
            ..Default::default()
        };
        Self::update(pool, id, &changes).await
    }

    pub async fn set_role(pool: &PgPool, id: DbId, role: &str) -> AppResult<User> {
        let changes = CredentialChanges {
            role: Some(role.to_string()),
            ..Default::default()
        };
        Self::update(pool, id, &changes).await
    }
}

fn validate_username(raw: &str) -> Result<String, CoreError> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(CoreError::Validation("Username is required".into()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(CoreError::Validation(format!(
            "Username must be at most {MAX_USERNAME_LEN} characters"
        )));
    }
    Ok(username.to_string())
}

async fn ensure_username_free(pool: &PgPool, username: &str, except: Option<DbId>) -> AppResult<()> {
    if UserRepo::username_taken(pool, username, except).await? {
        return Err(AppError::Core(CoreError::Conflict(
            "Username already exists".into(),
        )));
    }
    Ok(())
}

fn hash(password: &str) -> AppResult<String> {
    hash_password(password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))
}
