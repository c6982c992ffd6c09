//! Problem field rules: required-field validation, tag encoding, and the
//! partial-update representation used by `PUT /problems/{id}`.
//!
//! Tags are stored as a single comma-joined string so that the tag filter can
//! be a plain substring match; these helpers are the only place that encodes
//! or decodes that string.

use std::collections::BTreeSet;

use crate::error::CoreError;

/// Maximum title length (characters).
pub const MAX_TITLE_LEN: usize = 200;
/// Maximum category length (characters).
pub const MAX_CATEGORY_LEN: usize = 100;
/// Maximum length of the encoded tag string (characters).
pub const MAX_TAGS_LEN: usize = 200;
/// Maximum video link length (characters).
pub const MAX_YOUTUBE_LINK_LEN: usize = 255;

/// Separator used in the stored tag string.
pub const TAG_SEPARATOR: char = ',';

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// Split a user-supplied comma-separated tag string into trimmed, non-empty,
/// de-duplicated tags. First occurrence wins, order is preserved.
pub fn normalize_tags(raw: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    raw.split(TAG_SEPARATOR)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_string()))
        .map(str::to_string)
        .collect()
}

/// Encode tags for storage.
pub fn encode_tags(tags: &[String]) -> String {
    tags.join(",")
}

/// Decode a stored tag string back into its tags.
pub fn decode_tags(stored: &str) -> Vec<String> {
    stored
        .split(TAG_SEPARATOR)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Distinct tags across many stored tag strings, sorted alphabetically.
pub fn distinct_tags<'a>(stored: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    stored
        .into_iter()
        .flat_map(decode_tags)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn parse_tags(raw: &str) -> Result<Vec<String>, CoreError> {
    let tags = normalize_tags(raw);
    if tags.is_empty() {
        return Err(CoreError::Validation("At least one tag is required".into()));
    }
    check_len("tags", &encode_tags(&tags), MAX_TAGS_LEN)?;
    Ok(tags)
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// Validated fields of a new problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProblemFields {
    pub title: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub youtube_link: Option<String>,
}

/// Raw form values for a new problem, as received.
#[derive(Debug, Clone, Default)]
pub struct ProblemForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub youtube_link: Option<String>,
}

impl ProblemForm {
    /// Validate a create request. Title, description, category and tags are
    /// required and must not be blank; a blank video link means "none".
    pub fn into_new(self) -> Result<NewProblemFields, CoreError> {
        let title = required(self.title)
            .ok_or_else(|| CoreError::Validation(missing_fields_message()))?;
        let description = required(self.description)
            .ok_or_else(|| CoreError::Validation(missing_fields_message()))?;
        let category = required(self.category)
            .ok_or_else(|| CoreError::Validation(missing_fields_message()))?;
        let raw_tags = required(self.tags)
            .ok_or_else(|| CoreError::Validation(missing_fields_message()))?;

        check_len("title", &title, MAX_TITLE_LEN)?;
        check_len("category", &category, MAX_CATEGORY_LEN)?;
        let tags = parse_tags(&raw_tags)?;
        let youtube_link = required(self.youtube_link);
        if let Some(link) = &youtube_link {
            check_len("youtubeLink", link, MAX_YOUTUBE_LINK_LEN)?;
        }

        Ok(NewProblemFields {
            title,
            description,
            category,
            tags,
            youtube_link,
        })
    }

    /// Validate an update request. Blank scalar values are treated as "not
    /// provided"; a present-but-blank video link clears the link.
    pub fn into_patch(self) -> Result<ProblemPatch, CoreError> {
        let title = required(self.title);
        if let Some(t) = &title {
            check_len("title", t, MAX_TITLE_LEN)?;
        }
        let category = required(self.category);
        if let Some(c) = &category {
            check_len("category", c, MAX_CATEGORY_LEN)?;
        }
        let tags = match required(self.tags) {
            Some(raw) if !normalize_tags(&raw).is_empty() => Some(parse_tags(&raw)?),
            _ => None,
        };
        let youtube_link = match self.youtube_link {
            None => None,
            Some(raw) => {
                let cleared = required(Some(raw));
                if let Some(link) = &cleared {
                    check_len("youtubeLink", link, MAX_YOUTUBE_LINK_LEN)?;
                }
                Some(cleared)
            }
        };

        Ok(ProblemPatch {
            title,
            description: required(self.description),
            category,
            tags,
            youtube_link,
        })
    }
}

fn missing_fields_message() -> String {
    "Title, description, category and tags are required".to_string()
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

/// Partial update of a problem's scalar fields.
///
/// `youtube_link` distinguishes "leave as is" (`None`) from "clear"
/// (`Some(None)`) and "set" (`Some(Some(link))`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProblemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub youtube_link: Option<Option<String>>,
}

/// Resolve the `existing_files` form field of an update into the list of
/// references to keep.
///
/// - Field absent: keep every current file (`current` is returned as is).
/// - Field blank: keep nothing.
/// - Otherwise the field must be a JSON array of strings; references not in
///   `current` are dropped, so a problem can only ever point at files that
///   the attachment manager produced for it.
pub fn resolve_kept_files(
    existing_files: Option<&str>,
    current: &[String],
) -> Result<Vec<String>, CoreError> {
    let Some(raw) = existing_files else {
        return Ok(current.to_vec());
    };
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let requested: Vec<String> = serde_json::from_str(raw).map_err(|e| {
        CoreError::Validation(format!("Invalid existing_files list: {e}"))
    })?;

    let mut kept = Vec::with_capacity(requested.len());
    for reference in requested {
        if !current.contains(&reference) {
            tracing::warn!(%reference, "Ignoring kept file that does not belong to the problem");
            continue;
        }
        if !kept.contains(&reference) {
            kept.push(reference);
        }
    }
    Ok(kept)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Trimmed value, or `None` when absent or blank.
fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), CoreError> {
    if value.chars().count() > max {
        return Err(CoreError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}
