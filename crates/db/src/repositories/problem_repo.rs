//! Repository for the `problems` table.
//!
//! Every read joins `users` so rows carry the author's username.

use sqlx::PgPool;
use tecwiki_core::problem::distinct_tags;
use tecwiki_core::types::DbId;

use crate::models::problem::{CreateProblem, Problem, ProblemFilter, UpdateProblem};

/// Column list for a `problems p JOIN users u` select.
const COLUMNS: &str = "p.id, p.title, p.description, p.category, p.tags, p.files, \
    p.youtube_link, p.author_id, u.username AS author, p.created_at, p.updated_at";

/// Provides CRUD operations for problems.
pub struct ProblemRepo;

impl ProblemRepo {
    /// List problems, newest first.
    ///
    /// `tag` matches any problem whose stored tag string contains it;
    /// `category` must match exactly. Blank filters are ignored.
    pub async fn list(pool: &PgPool, filter: &ProblemFilter) -> Result<Vec<Problem>, sqlx::Error> {
        let (tag, category) = filter.normalized();
        let query = format!(
            "SELECT {COLUMNS}
             FROM problems p
             JOIN users u ON u.id = p.author_id
             WHERE ($1::TEXT IS NULL OR strpos(p.tags, $1) > 0)
               AND ($2::TEXT IS NULL OR p.category = $2)
             ORDER BY p.created_at DESC, p.id DESC"
        );
        sqlx::query_as::<_, Problem>(&query)
            .bind(tag)
            .bind(category)
            .fetch_all(pool)
            .await
    }

    /// Find a problem by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Problem>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS}
             FROM problems p
             JOIN users u ON u.id = p.author_id
             WHERE p.id = $1"
        );
        sqlx::query_as::<_, Problem>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Insert a new problem, returning the created row.
    ///
    /// An unknown `author_id` fails with the `fk_problems_author` constraint.
    pub async fn create(pool: &PgPool, input: &CreateProblem) -> Result<Problem, sqlx::Error> {
        let query = format!(
            "WITH p AS (
                INSERT INTO problems
                    (title, description, category, tags, files, youtube_link, author_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
             )
             SELECT {COLUMNS} FROM p JOIN users u ON u.id = p.author_id"
        );
        sqlx::query_as::<_, Problem>(&query)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.category)
            .bind(&input.tags)
            .bind(&input.files)
            .bind(&input.youtube_link)
            .bind(input.author_id)
            .fetch_one(pool)
            .await
    }

    /// Update a problem inside a transaction.
    ///
    /// The row is locked with `SELECT ... FOR UPDATE` before it is written.
    /// Scalar fields are applied only when `Some`; `files` always replaces
    /// the stored list. Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateProblem,
    ) -> Result<Option<Problem>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let locked: Option<(DbId,)> =
            sqlx::query_as("SELECT id FROM problems WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Ok(None);
        }

        let (set_link, link) = match &input.youtube_link {
            Some(link) => (true, link.as_deref()),
            None => (false, None),
        };
        sqlx::query(
            "UPDATE problems SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                tags = COALESCE($5, tags),
                youtube_link = CASE WHEN $6::BOOLEAN THEN $7::TEXT ELSE youtube_link END,
                files = $8
             WHERE id = $1",
        )
        .bind(id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.category)
        .bind(&input.tags)
        .bind(set_link)
        .bind(link)
        .bind(&input.files)
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "SELECT {COLUMNS}
             FROM problems p
             JOIN users u ON u.id = p.author_id
             WHERE p.id = $1"
        );
        let problem = sqlx::query_as::<_, Problem>(&query)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(problem))
    }

    /// Hard-delete a problem. Returns `true` if a row was deleted.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM problems WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Distinct categories, sorted.
    pub async fn list_categories(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT DISTINCT category FROM problems ORDER BY category")
            .fetch_all(pool)
            .await
    }

    /// Distinct tags across all problems, sorted.
    pub async fn list_tags(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
        let stored: Vec<String> = sqlx::query_scalar("SELECT tags FROM problems")
            .fetch_all(pool)
            .await?;
        Ok(distinct_tags(stored.iter().map(String::as_str)))
    }

    /// Number of problems authored by `author_id`.
    pub async fn count_by_author(pool: &PgPool, author_id: DbId) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM problems WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(pool)
            .await?;
        Ok(count.0)
    }
}
