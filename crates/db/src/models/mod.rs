//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` entity struct matching the database row
//! - A serializable response type where the row is exposed over the API
//! - Create / update DTOs consumed by the repositories

pub mod problem;
pub mod session;
pub mod user;
