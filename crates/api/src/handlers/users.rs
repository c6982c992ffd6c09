//! Handlers for the `/users` resource.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tecwiki_core::error::CoreError;
use tecwiki_core::policy::{authorize, demotes_last_admin, Action};
use tecwiki_core::roles::Role;
use tecwiki_core::types::DbId;
use tecwiki_db::models::user::{User, UserResponse};
use tecwiki_db::repositories::{ProblemRepo, SessionRepo, UserRepo};

use crate::auth::credentials::{CredentialChanges, CredentialStore};
use crate::error::{AppError, AppResult};
use crate::extract::{AppJson, AppPath};
use crate::handlers::auth::present;
use crate::middleware::auth::AuthUser;
use crate::response::MessageResponse;
use crate::state::AppState;

/// Request body for `PUT /users/{id}`. Absent fields are left unchanged;
/// an empty password is ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

async fn find_user(state: &AppState, id: DbId) -> AppResult<User> {
    UserRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "User", id }))
}

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    user: Option<AuthUser>,
) -> AppResult<Json<Vec<UserResponse>>> {
    authorize(AuthUser::as_caller(&user), &Action::ListUsers)?;
    let users = UserRepo::list(&state.pool).await?;
    Ok(Json(users.iter().map(UserResponse::from).collect()))
}

/// GET /api/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    AppPath(id): AppPath<DbId>,
) -> AppResult<Json<UserResponse>> {
    authorize(AuthUser::as_caller(&user), &Action::ViewUser { target_id: id })?;
    let target = find_user(&state, id).await?;
    Ok(Json(UserResponse::from(&target)))
}

/// PUT /api/users/{id}
///
/// Changing the password revokes the target's open sessions. Demoting the
/// last admin is refused. The check and the write run under the admin lock.
pub async fn update_user(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    AppPath(id): AppPath<DbId>,
    AppJson(input): AppJson<UpdateUserRequest>,
) -> AppResult<Json<UserResponse>> {
    authorize(AuthUser::as_caller(&user), &Action::UpdateUser)?;

    let mut lock = UserRepo::lock_admins(&state.pool).await?;
    let target = lock
        .find_user(id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "User", id }))?;

    if let Some(role) = input.role.as_deref() {
        let new_role = Role::from_name(role)?;
        if demotes_last_admin(target.role()?, new_role, lock.admin_count()) {
            return Err(AppError::Core(CoreError::Conflict(
                "Cannot demote the last administrator".into(),
            )));
        }
    }

    let changes = CredentialChanges {
        username: input.username.clone(),
        password: present(&input.password).map(str::to_string),
        role: input.role.clone(),
    };
    let patch = CredentialStore::prepare_changes(&state.pool, id, &changes).await?;
    let updated = lock
        .update_user(id, &patch)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "User", id }))?;

    if changes.password.is_some() {
        let revoked = SessionRepo::revoke_all_for_user(&state.pool, id).await?;
        tracing::info!(user_id = id, revoked, "Password changed, sessions revoked");
    }
    tracing::info!(
        user_id = id,
        role = %updated.role,
        updated_by = ?user.map(|u| u.caller.user_id),
        "User updated"
    );
    Ok(Json(UserResponse::from(&updated)))
}

/// DELETE /api/users/{id}
///
/// Self-deletion, deleting the last admin and deleting a user who still
/// authors problems are refused. The check and the delete run under the
/// admin lock.
pub async fn delete_user(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    AppPath(id): AppPath<DbId>,
) -> AppResult<Json<MessageResponse>> {
    let mut lock = UserRepo::lock_admins(&state.pool).await?;
    let target = lock
        .find_user(id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "User", id }))?;
    authorize(
        AuthUser::as_caller(&user),
        &Action::DeleteUser {
            target_id: id,
            target_role: target.role()?,
            admin_count: lock.admin_count(),
        },
    )?;

    if ProblemRepo::count_by_author(&state.pool, id).await? > 0 {
        return Err(AppError::Core(CoreError::Conflict(
            "Cannot delete a user who still authors problems".into(),
        )));
    }

    if !lock.delete_user(id).await? {
        return Err(AppError::Core(CoreError::NotFound { entity: "User", id }));
    }

    tracing::info!(
        user_id = id,
        deleted_by = ?user.map(|u| u.caller.user_id),
        "User deleted"
    );
    Ok(Json(MessageResponse::new("User deleted")))
}
