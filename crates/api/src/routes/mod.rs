pub mod auth;
pub mod health;
pub mod problems;
pub mod users;

use axum::routing::post;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /health                                          health check (public)
/// /setup                                           create first admin (public)
///
/// /auth/login                                      login (public)
/// /auth/logout                                     logout (requires auth)
/// /auth/me                                         current user (requires auth)
/// /auth/register                                   create user (admin)
///
/// /problems                                        list (public), create (admin, tecnico)
/// /problems/categories                             distinct categories (public)
/// /problems/tags                                   distinct tags (public)
/// /problems/files/{*filename}                      serve attachment (public)
/// /problems/{id}                                   get (public), update (admin, author), delete (admin)
///
/// /users                                           list (admin)
/// /users/{id}                                      get (admin, self), update, delete (admin)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .route("/setup", post(handlers::setup::setup_admin))
        .nest("/auth", auth::router())
        .nest("/problems", problems::router())
        .nest("/users", users::router())
}
