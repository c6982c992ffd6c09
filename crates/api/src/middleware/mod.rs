//! Request extractors.
//!
//! - [`auth::AuthUser`] -- The caller resolved from the session cookie.

pub mod auth;
