//! Authentication primitives.
//!
//! - [`password`] -- Argon2id password hashing and verification.
//! - [`session`] -- Session tokens and the session cookie.
//! - [`credentials`] -- The credential store built on the users table.

pub mod credentials;
pub mod password;
pub mod session;
