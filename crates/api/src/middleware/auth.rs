//! Session-based authentication extractor for Axum handlers.

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;
use tecwiki_core::error::CoreError;
use tecwiki_core::policy::{Caller, UNAUTHENTICATED_MESSAGE};
use tecwiki_core::types::DbId;
use tecwiki_db::repositories::{SessionRepo, UserRepo};

use crate::auth::session::{hash_token_id, token_from_headers, validate_token};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// The authenticated caller, resolved from the session cookie (or a Bearer
/// token) on every request.
///
/// The role comes from the users table, not from the token, so role changes
/// take effect on the next request.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = user.caller.user_id, role = %user.caller.role, "handling request");
///     Ok(Json(()))
/// }
/// ```
///
/// Take `Option<AuthUser>` in handlers whose permission depends on the
/// policy rather than on being logged in; a missing or stale session then
/// arrives as `None`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub caller: Caller,
    pub username: String,
    /// The `user_sessions` row backing this request.
    pub session_id: DbId,
}

impl AuthUser {
    /// The caller in the form the authorization policy expects.
    pub fn as_caller(user: &Option<AuthUser>) -> Option<&Caller> {
        user.as_ref().map(|u| &u.caller)
    }
}

fn unauthenticated(message: &str) -> AppError {
    AppError::Core(CoreError::Unauthorized(message.into()))
}

/// Resolve the request's session. `Ok(None)` means no token was presented.
async fn resolve(parts: &Parts, state: &AppState) -> AppResult<Option<AuthUser>> {
    let Some(token) = token_from_headers(&parts.headers) else {
        return Ok(None);
    };

    let claims = validate_token(&token, &state.config.session)
        .map_err(|_| unauthenticated("Invalid or expired session"))?;

    let session = SessionRepo::find_active(&state.pool, &hash_token_id(&claims.jti), claims.sub)
        .await?
        .ok_or_else(|| unauthenticated("Invalid or expired session"))?;

    let user = UserRepo::find_by_id(&state.pool, session.user_id)
        .await?
        .ok_or_else(|| unauthenticated("User no longer exists"))?;

    Ok(Some(AuthUser {
        caller: Caller::new(user.id, user.role()?),
        username: user.username,
        session_id: session.id,
    }))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        resolve(parts, state)
            .await?
            .ok_or_else(|| unauthenticated(UNAUTHENTICATED_MESSAGE))
    }
}

impl OptionalFromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        match resolve(parts, state).await {
            Err(AppError::Core(CoreError::Unauthorized(_))) => Ok(None),
            other => other,
        }
    }
}
