//! Handlers for the `/problems` resource, including attachment serving.

use axum::body::Body;
use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use tecwiki_core::attachments::Upload;
use tecwiki_core::error::CoreError;
use tecwiki_core::policy::{authorize, Action};
use tecwiki_core::problem::{encode_tags, resolve_kept_files, ProblemForm};
use tecwiki_core::types::DbId;
use tecwiki_db::models::problem::{CreateProblem, ProblemFilter, ProblemResponse, UpdateProblem};
use tecwiki_db::repositories::ProblemRepo;
use tokio_util::io::ReaderStream;

use crate::error::{AppError, AppResult};
use crate::extract::{AppMultipart, AppPath, AppQuery};
use crate::middleware::auth::AuthUser;
use crate::response::MessageResponse;
use crate::state::AppState;

/// Multipart field carrying uploaded files (repeatable).
const FILES_FIELD: &str = "files";

// ---------------------------------------------------------------------------
// Multipart parsing
// ---------------------------------------------------------------------------

/// The parts of a problem create/update form.
#[derive(Debug, Default)]
struct ProblemSubmission {
    form: ProblemForm,
    /// Raw `existing_files` value; `None` when the field was not sent.
    existing_files: Option<String>,
    uploads: Vec<Upload>,
}

async fn read_submission(mut multipart: Multipart) -> AppResult<ProblemSubmission> {
    let mut submission = ProblemSubmission::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == FILES_FIELD {
            let file_name = field.file_name().unwrap_or("").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            submission.uploads.push(Upload::new(file_name, data.to_vec()));
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        let form = &mut submission.form;
        match name.as_str() {
            "title" => form.title = Some(text),
            "description" => form.description = Some(text),
            "category" => form.category = Some(text),
            "tags" => form.tags = Some(text),
            "youtubeLink" => form.youtube_link = Some(text),
            "existing_files" => submission.existing_files = Some(text),
            _ => {} // ignore unknown fields
        }
    }

    Ok(submission)
}

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Problem",
        id,
    })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/problems?tag=&category=
pub async fn list_problems(
    State(state): State<AppState>,
    AppQuery(filter): AppQuery<ProblemFilter>,
) -> AppResult<Json<Vec<ProblemResponse>>> {
    let problems = ProblemRepo::list(&state.pool, &filter).await?;
    Ok(Json(problems.into_iter().map(ProblemResponse::from).collect()))
}

/// GET /api/problems/{id}
pub async fn get_problem(
    State(state): State<AppState>,
    AppPath(id): AppPath<DbId>,
) -> AppResult<Json<ProblemResponse>> {
    let problem = ProblemRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(ProblemResponse::from(problem)))
}

/// POST /api/problems (multipart)
///
/// Fields: `title`, `description`, `category`, `tags`, optional
/// `youtubeLink`, and any number of `files`.
pub async fn create_problem(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    AppMultipart(multipart): AppMultipart,
) -> AppResult<(StatusCode, Json<ProblemResponse>)> {
    authorize(AuthUser::as_caller(&user), &Action::CreateProblem)?;
    let author_id = user
        .as_ref()
        .map(|u| u.caller.user_id)
        .ok_or_else(|| AppError::InternalError("Authorized caller without identity".into()))?;

    let submission = read_submission(multipart).await?;
    let fields = submission.form.into_new()?;

    let mut files = Vec::with_capacity(submission.uploads.len());
    for upload in &submission.uploads {
        if let Some(reference) = state.attachments.store(upload).await? {
            files.push(reference);
        }
    }

    let input = CreateProblem {
        title: fields.title,
        description: fields.description,
        category: fields.category,
        tags: encode_tags(&fields.tags),
        files,
        youtube_link: fields.youtube_link,
        author_id,
    };
    let problem = match ProblemRepo::create(&state.pool, &input).await {
        Ok(problem) => problem,
        Err(e) => {
            state.attachments.remove_all(&input.files).await;
            return Err(e.into());
        }
    };

    tracing::info!(
        problem_id = problem.id,
        user_id = author_id,
        files = problem.files.len(),
        "Problem created"
    );
    Ok((StatusCode::CREATED, Json(ProblemResponse::from(problem))))
}

/// PUT /api/problems/{id} (multipart)
///
/// Blank or missing scalar fields keep their value; a sent-but-blank
/// `youtubeLink` clears the link. `existing_files` is a JSON list of the
/// current references to keep (absent keeps all, blank keeps none); new
/// `files` are appended after the kept ones. Dropped files are deleted only
/// after the row is updated.
pub async fn update_problem(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    AppPath(id): AppPath<DbId>,
    AppMultipart(multipart): AppMultipart,
) -> AppResult<Json<ProblemResponse>> {
    let problem = ProblemRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    authorize(
        AuthUser::as_caller(&user),
        &Action::EditProblem {
            author_id: problem.author_id,
        },
    )?;

    let submission = read_submission(multipart).await?;
    let patch = submission.form.into_patch()?;
    let kept = resolve_kept_files(submission.existing_files.as_deref(), &problem.files)?;
    let plan = state
        .attachments
        .reconcile(&problem.files, &kept, &submission.uploads)
        .await?;

    let input = UpdateProblem {
        title: patch.title,
        description: patch.description,
        category: patch.category,
        tags: patch.tags.as_deref().map(encode_tags),
        youtube_link: patch.youtube_link,
        files: plan.files().to_vec(),
    };
    let updated = match ProblemRepo::update(&state.pool, id, &input).await {
        Ok(Some(updated)) => updated,
        Ok(None) => {
            state.attachments.discard(plan).await;
            return Err(not_found(id));
        }
        Err(e) => {
            tracing::error!(problem_id = id, error = %e, "Problem update failed");
            state.attachments.discard(plan).await;
            return Err(e.into());
        }
    };
    state.attachments.apply(plan).await;

    tracing::info!(
        problem_id = id,
        user_id = ?user.map(|u| u.caller.user_id),
        files = updated.files.len(),
        "Problem updated"
    );
    Ok(Json(ProblemResponse::from(updated)))
}

/// DELETE /api/problems/{id}
///
/// Stored attachments are removed best-effort before the row is deleted.
pub async fn delete_problem(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    AppPath(id): AppPath<DbId>,
) -> AppResult<Json<MessageResponse>> {
    authorize(AuthUser::as_caller(&user), &Action::DeleteProblem)?;

    let problem = ProblemRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| not_found(id))?;

    state.attachments.remove_all(&problem.files).await;
    if !ProblemRepo::delete(&state.pool, id).await? {
        return Err(not_found(id));
    }

    tracing::info!(
        problem_id = id,
        user_id = ?user.map(|u| u.caller.user_id),
        "Problem deleted"
    );
    Ok(Json(MessageResponse::new("Problem deleted")))
}

/// GET /api/problems/categories
pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    Ok(Json(ProblemRepo::list_categories(&state.pool).await?))
}

/// GET /api/problems/tags
pub async fn list_tags(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    Ok(Json(ProblemRepo::list_tags(&state.pool).await?))
}

/// Query parameters for the file endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct FileQuery {
    /// `true` (any case) forces `Content-Disposition: attachment`.
    pub download: Option<String>,
}

/// GET /api/problems/files/{*filename}?download=bool
///
/// `filename` may carry the `uploads/` prefix of a stored reference.
pub async fn serve_file(
    State(state): State<AppState>,
    AppPath(filename): AppPath<String>,
    AppQuery(query): AppQuery<FileQuery>,
) -> AppResult<Response> {
    let force_download = query
        .download
        .as_deref()
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));

    let served = state.attachments.open(&filename, force_download).await?;
    let disposition = format!(
        "{}; filename=\"{}\"",
        served.disposition.as_str(),
        served.display_name
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, served.mime_type)
        .header(header::CONTENT_LENGTH, served.size.to_string())
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(ReaderStream::new(served.file)))
        .map_err(|e| AppError::InternalError(format!("Failed to build file response: {e}")))
}
