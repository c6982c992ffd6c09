//! Route definitions for the `/problems` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::problems;
use crate::state::AppState;

/// Routes mounted at `/problems`.
///
/// ```text
/// GET    /                    -> list_problems (?tag=, ?category=)
/// POST   /                    -> create_problem (multipart)
/// GET    /categories          -> list_categories
/// GET    /tags                -> list_tags
/// GET    /files/{*filename}   -> serve_file (?download=true)
/// GET    /{id}                -> get_problem
/// PUT    /{id}                -> update_problem (multipart)
/// DELETE /{id}                -> delete_problem
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(problems::list_problems).post(problems::create_problem),
        )
        .route("/categories", get(problems::list_categories))
        .route("/tags", get(problems::list_tags))
        .route("/files/{*filename}", get(problems::serve_file))
        .route(
            "/{id}",
            get(problems::get_problem)
                .put(problems::update_problem)
                .delete(problems::delete_problem),
        )
}
