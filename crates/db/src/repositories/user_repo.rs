//! Repository for the `users` table.

use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use tecwiki_core::roles::{Role, ROLE_ADMIN};
use tecwiki_core::types::DbId;

use crate::models::user::{CreateUser, UpdateUser, User};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, username, password_hash, role, created_at, updated_at";

/// Advisory lock key taken by [`UserRepo::lock_admins`].
const ADMIN_LOCK_KEY: i64 = 0x7465_6377_0001;

/// Provides CRUD operations for users.
pub struct UserRepo;

impl UserRepo {
    /// Insert a new user, returning the created row.
    ///
    /// A duplicate username fails with the `uq_users_username` constraint.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        insert(pool, input).await
    }

    /// Find a user by internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        select_by_id(pool, id).await
    }

    /// Find a user by username (case-sensitive).
    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE username = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    /// Whether any user other than `except_id` holds `username`.
    pub async fn username_taken(
        pool: &PgPool,
        username: &str,
        except_id: Option<DbId>,
    ) -> Result<bool, sqlx::Error> {
        let taken: (bool,) = sqlx::query_as(
            "SELECT EXISTS(
                SELECT 1 FROM users WHERE username = $1 AND ($2::BIGINT IS NULL OR id <> $2)
             )",
        )
        .bind(username)
        .bind(except_id)
        .fetch_one(pool)
        .await?;
        Ok(taken.0)
    }

    /// List all users in creation order.
    pub async fn list(pool: &PgPool) -> Result<Vec<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users ORDER BY id");
        sqlx::query_as::<_, User>(&query).fetch_all(pool).await
    }

    /// Number of users holding the `admin` role.
    pub async fn count_admins(pool: &PgPool) -> Result<i64, sqlx::Error> {
        count_admins(pool).await
    }

    /// Update a user. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateUser,
    ) -> Result<Option<User>, sqlx::Error> {
        update_row(pool, id, input).await
    }

    /// Hard-delete a user. Sessions cascade; authored problems block the
    /// delete through the `RESTRICT` foreign key.
    ///
    /// Returns `true` if a row was deleted.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        delete_row(pool, id).await
    }

    /// Open a transaction that holds the admin lock and read the admin count
    /// under it.
    ///
    /// Every change whose permission depends on the number of admins
    /// (deleting or demoting a user, the initial setup) runs through the
    /// returned [`AdminLock`], so concurrent changes are serialized and
    /// each one sees the count left by the previous commit.
    pub async fn lock_admins(pool: &PgPool) -> Result<AdminLock, sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(ADMIN_LOCK_KEY)
            .execute(&mut *tx)
            .await?;
        let admin_count = count_admins(&mut *tx).await?;
        Ok(AdminLock { tx, admin_count })
    }
}

/// A transaction holding the admin lock.
///
/// The committing methods consume the lock. Dropping it without calling one
/// of them rolls the transaction back, which also releases the lock.
pub struct AdminLock {
    tx: Transaction<'static, Postgres>,
    admin_count: i64,
}

impl AdminLock {
    /// Number of admins at the time the lock was taken.
    pub fn admin_count(&self) -> i64 {
        self.admin_count
    }

    /// Find a user inside the locked transaction.
    pub async fn find_user(&mut self, id: DbId) -> Result<Option<User>, sqlx::Error> {
        select_by_id(&mut *self.tx, id).await
    }

    /// Insert a user and commit.
    pub async fn create_user(mut self, input: &CreateUser) -> Result<User, sqlx::Error> {
        let user = insert(&mut *self.tx, input).await?;
        self.tx.commit().await?;
        Ok(user)
    }

    /// Update a user and commit. Returns `None` (and rolls back) if the row
    /// is gone.
    pub async fn update_user(
        mut self,
        id: DbId,
        input: &UpdateUser,
    ) -> Result<Option<User>, sqlx::Error> {
        let Some(user) = update_row(&mut *self.tx, id, input).await? else {
            return Ok(None);
        };
        self.tx.commit().await?;
        Ok(Some(user))
    }

    /// Delete a user and commit. Returns `false` if no row was deleted.
    pub async fn delete_user(mut self, id: DbId) -> Result<bool, sqlx::Error> {
        let deleted = delete_row(&mut *self.tx, id).await?;
        self.tx.commit().await?;
        Ok(deleted)
    }
}

// ---------------------------------------------------------------------------
// Statements shared by the pool and the locked transaction
// ---------------------------------------------------------------------------

async fn insert<'e>(db: impl PgExecutor<'e>, input: &CreateUser) -> Result<User, sqlx::Error> {
    let query = format!(
        "INSERT INTO users (username, password_hash, role)
         VALUES ($1, $2, $3)
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, User>(&query)
        .bind(&input.username)
        .bind(&input.password_hash)
        .bind(input.role.as_str())
        .fetch_one(db)
        .await
}

async fn select_by_id<'e>(db: impl PgExecutor<'e>, id: DbId) -> Result<Option<User>, sqlx::Error> {
    let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
    sqlx::query_as::<_, User>(&query)
        .bind(id)
        .fetch_optional(db)
        .await
}

async fn count_admins<'e>(db: impl PgExecutor<'e>) -> Result<i64, sqlx::Error> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = $1")
        .bind(ROLE_ADMIN)
        .fetch_one(db)
        .await?;
    Ok(count.0)
}

async fn update_row<'e>(
    db: impl PgExecutor<'e>,
    id: DbId,
    input: &UpdateUser,
) -> Result<Option<User>, sqlx::Error> {
    let query = format!(
        "UPDATE users SET
            username = COALESCE($2, username),
            password_hash = COALESCE($3, password_hash),
            role = COALESCE($4, role)
         WHERE id = $1
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, User>(&query)
        .bind(id)
        .bind(&input.username)
        .bind(&input.password_hash)
        .bind(input.role.map(Role::as_str))
        .fetch_optional(db)
        .await
}

async fn delete_row<'e>(db: impl PgExecutor<'e>, id: DbId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}
