//! Request handlers.
//!
//! Handlers resolve the caller through [`AuthUser`](crate::middleware::auth::AuthUser),
//! check the action with `tecwiki_core::policy::authorize`, delegate to the
//! repositories in `tecwiki_db` and map errors via [`AppError`](crate::error::AppError).

pub mod auth;
pub mod problems;
pub mod setup;
pub mod users;
