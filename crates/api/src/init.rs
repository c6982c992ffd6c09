//! Database initialization: schema migration, upload directory and the
//! optional default accounts (`admin`, `tecnico`, `usuario`).
//!
//! Used by the `tecwiki-init` binary. Without seeding, the first
//! administrator is created later through `POST /api/setup`.

use sqlx::PgPool;
use tecwiki_core::attachments::AttachmentStore;
use tecwiki_core::roles::{ROLE_ADMIN, ROLE_TECNICO, ROLE_USER};
use tecwiki_db::repositories::UserRepo;

use crate::auth::credentials::CredentialStore;
use crate::error::{AppError, AppResult};

/// Username of the seeded administrator.
pub const DEFAULT_ADMIN: &str = "admin";
/// Username of the seeded technician.
pub const DEFAULT_TECNICO: &str = "tecnico";
/// Username of the seeded regular user.
pub const DEFAULT_USER: &str = "usuario";

/// Passwords for the default accounts. An account whose password is `None`
/// is not created.
#[derive(Debug, Clone, Default)]
pub struct SeedAccounts {
    pub admin_password: String,
    pub tecnico_password: Option<String>,
    pub user_password: Option<String>,
}

/// What [`init_database`] found and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// The default accounts were created; the usernames are listed.
    Seeded(Vec<String>),
    /// No `admin` account exists and none was requested.
    NoUsers,
    /// An `admin` account already exists; nothing was created.
    AlreadyInitialized,
}

/// Bring the schema up to date, create the upload directory and, if `seed`
/// is given and no `admin` account exists yet, create the default accounts.
///
/// Safe to run repeatedly.
pub async fn init_database(
    pool: &PgPool,
    attachments: &AttachmentStore,
    seed: Option<&SeedAccounts>,
) -> AppResult<InitOutcome> {
    attachments.ensure_root().await?;
    tecwiki_db::run_migrations(pool)
        .await
        .map_err(|e| AppError::InternalError(format!("Migration failed: {e}")))?;

    if UserRepo::find_by_username(pool, DEFAULT_ADMIN).await?.is_some() {
        tracing::info!("Database already initialized with users");
        return Ok(InitOutcome::AlreadyInitialized);
    }
    let Some(seed) = seed else {
        tracing::info!("Database initialized without users; POST /api/setup creates the admin");
        return Ok(InitOutcome::NoUsers);
    };

    let input =
        CredentialStore::prepare_new(pool, DEFAULT_ADMIN, &seed.admin_password, ROLE_ADMIN).await?;
    let lock = UserRepo::lock_admins(pool).await?;
    lock.create_user(&input).await?;
    let mut created = vec![DEFAULT_ADMIN.to_string()];

    let optional = [
        (DEFAULT_TECNICO, seed.tecnico_password.as_deref(), ROLE_TECNICO),
        (DEFAULT_USER, seed.user_password.as_deref(), ROLE_USER),
    ];
    for (username, password, role) in optional {
        let Some(password) = password else { continue };
        if UserRepo::find_by_username(pool, username).await?.is_some() {
            tracing::warn!(username, "Account already exists, not seeding it");
            continue;
        }
        CredentialStore::create(pool, username, password, role).await?;
        created.push(username.to_string());
    }

    tracing::info!(accounts = ?created, "Default accounts created");
    Ok(InitOutcome::Seeded(created))
}
