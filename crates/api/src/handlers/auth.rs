//! Handlers for the `/auth` resource (login, logout, me, register).

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderName, StatusCode};
use axum::Json;
use serde::Deserialize;
use tecwiki_core::error::CoreError;
use tecwiki_core::policy::{authorize, Action};
use tecwiki_db::models::session::CreateSession;
use tecwiki_db::models::user::UserResponse;
use tecwiki_db::repositories::SessionRepo;

use crate::auth::credentials::CredentialStore;
use crate::auth::session::{clear_session_cookie, issue_token, session_cookie};
use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::middleware::auth::AuthUser;
use crate::response::MessageResponse;
use crate::state::AppState;

/// Message returned for every failed login, whatever the cause.
const INVALID_CREDENTIALS: &str = "Invalid username or password";

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/login`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Request body for `POST /auth/register`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

/// Non-empty value of an optional request field.
pub(crate) fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/auth/login
///
/// Check credentials, open a session and set the session cookie.
pub async fn login(
    State(state): State<AppState>,
    AppJson(input): AppJson<LoginRequest>,
) -> AppResult<([(HeaderName, String); 1], Json<UserResponse>)> {
    let (Some(username), Some(password)) = (present(&input.username), present(&input.password))
    else {
        return Err(AppError::BadRequest(
            "Username and password are required".into(),
        ));
    };

    let Some(user) = CredentialStore::verify(&state.pool, username, password).await? else {
        tracing::info!(%username, "Rejected login");
        return Err(AppError::Core(CoreError::Unauthorized(
            INVALID_CREDENTIALS.into(),
        )));
    };

    let session_config = &state.config.session;
    let issued = issue_token(user.id, &user.role, session_config)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;
    SessionRepo::create(
        &state.pool,
        &CreateSession {
            user_id: user.id,
            token_hash: issued.token_hash,
            expires_at: issued.expires_at,
        },
    )
    .await?;

    tracing::info!(user_id = user.id, role = %user.role, "User logged in");
    Ok((
        [(SET_COOKIE, session_cookie(&issued.token, session_config))],
        Json(UserResponse::from(&user)),
    ))
}

/// POST /api/auth/logout
///
/// Revoke the current session and clear the cookie.
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<([(HeaderName, String); 1], Json<MessageResponse>)> {
    SessionRepo::revoke(&state.pool, user.session_id).await?;
    tracing::info!(user_id = user.caller.user_id, "User logged out");
    Ok((
        [(SET_COOKIE, clear_session_cookie(&state.config.session))],
        Json(MessageResponse::new("Logged out")),
    ))
}

/// GET /api/auth/me
pub async fn me(user: AuthUser) -> Json<UserResponse> {
    Json(UserResponse {
        id: user.caller.user_id,
        username: user.username,
        role: user.caller.role.to_string(),
    })
}

/// POST /api/auth/register
///
/// Admin-only account creation.
pub async fn register(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    AppJson(input): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    authorize(AuthUser::as_caller(&user), &Action::RegisterUser)?;

    let (Some(username), Some(password), Some(role)) = (
        present(&input.username),
        present(&input.password),
        present(&input.role),
    ) else {
        return Err(AppError::BadRequest("All fields are required".into()));
    };

    let created = CredentialStore::create(&state.pool, username, password, role).await?;
    tracing::info!(
        user_id = created.id,
        role = %created.role,
        registered_by = ?user.map(|u| u.caller.user_id),
        "User registered"
    );
    Ok((StatusCode::CREATED, Json(UserResponse::from(&created))))
}
