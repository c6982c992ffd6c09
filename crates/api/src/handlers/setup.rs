//! Handler for `POST /setup`: creation of the first administrator.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tecwiki_core::policy::{authorize, Action};
use tecwiki_core::roles::ROLE_ADMIN;
use tecwiki_db::repositories::UserRepo;

use crate::auth::credentials::CredentialStore;
use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::handlers::auth::present;
use crate::response::MessageResponse;
use crate::state::AppState;

/// Request body for `POST /setup`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SetupRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// POST /api/setup
///
/// Public, but only succeeds while no admin exists. Concurrent calls are
/// serialized by the admin lock, so at most one of them creates an admin.
pub async fn setup_admin(
    State(state): State<AppState>,
    AppJson(input): AppJson<SetupRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    let lock = UserRepo::lock_admins(&state.pool).await?;
    authorize(
        None,
        &Action::InitialSetup {
            admin_count: lock.admin_count(),
        },
    )?;

    let (Some(username), Some(password)) = (present(&input.username), present(&input.password))
    else {
        return Err(AppError::BadRequest(
            "Username and password are required".into(),
        ));
    };

    let input = CredentialStore::prepare_new(&state.pool, username, password, ROLE_ADMIN).await?;
    let admin = lock.create_user(&input).await?;
    tracing::info!(user_id = admin.id, "Initial administrator configured");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Administrator configured")),
    ))
}
