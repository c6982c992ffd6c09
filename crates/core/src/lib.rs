//! Domain layer for the TecWiki knowledge base.
//!
//! Holds everything that does not depend on HTTP or SQL: the error type,
//! roles, the authorization policy, problem field rules and the attachment
//! manager that owns the upload directory.

pub mod attachments;
pub mod error;
pub mod policy;
pub mod problem;
pub mod roles;
pub mod types;
