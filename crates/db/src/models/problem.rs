//! Problem entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tecwiki_core::problem::decode_tags;
use tecwiki_core::types::{DbId, Timestamp};

/// A row from the `problems` table joined with the author's username.
#[derive(Debug, Clone, FromRow)]
pub struct Problem {
    pub id: DbId,
    pub title: String,
    pub description: String,
    pub category: String,
    /// Comma-joined tag string (see `tecwiki_core::problem::encode_tags`).
    pub tags: String,
    pub files: Vec<String>,
    pub youtube_link: Option<String>,
    pub author_id: DbId,
    /// Username of `author_id`.
    pub author: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Problem representation for API responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProblemResponse {
    pub id: DbId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub files: Vec<String>,
    #[serde(rename = "youtubeLink")]
    pub youtube_link: Option<String>,
    pub author: String,
    pub author_id: DbId,
    pub created_at: Timestamp,
}

impl From<Problem> for ProblemResponse {
    fn from(p: Problem) -> Self {
        Self {
            id: p.id,
            tags: decode_tags(&p.tags),
            title: p.title,
            description: p.description,
            category: p.category,
            files: p.files,
            youtube_link: p.youtube_link,
            author: p.author,
            author_id: p.author_id,
            created_at: p.created_at,
        }
    }
}

/// DTO for inserting a problem. `tags` is already encoded.
#[derive(Debug, Clone)]
pub struct CreateProblem {
    pub title: String,
    pub description: String,
    pub category: String,
    pub tags: String,
    pub files: Vec<String>,
    pub youtube_link: Option<String>,
    pub author_id: DbId,
}

/// DTO for updating a problem.
///
/// Scalar fields are applied only when `Some`. `youtube_link` is
/// `None` to leave the link alone, `Some(None)` to clear it. `files` always
/// replaces the stored list.
#[derive(Debug, Clone, Default)]
pub struct UpdateProblem {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub youtube_link: Option<Option<String>>,
    pub files: Vec<String>,
}

/// Query parameters for `GET /problems`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProblemFilter {
    /// Substring matched against the comma-joined tag string.
    pub tag: Option<String>,
    /// Exact category match.
    pub category: Option<String>,
}

impl ProblemFilter {
    /// Blank parameters are treated as absent.
    pub fn normalized(&self) -> (Option<&str>, Option<&str>) {
        fn non_blank(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.is_empty())
        }
        (non_blank(&self.tag), non_blank(&self.category))
    }
}
