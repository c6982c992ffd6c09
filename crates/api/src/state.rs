use std::sync::Arc;

use tecwiki_core::attachments::AttachmentStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: tecwiki_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Attachment storage rooted at `config.upload_dir`.
    pub attachments: Arc<AttachmentStore>,
}

impl AppState {
    pub fn new(pool: tecwiki_db::DbPool, config: ServerConfig) -> Self {
        let attachments = Arc::new(AttachmentStore::new(config.upload_dir.clone()));
        Self {
            pool,
            config: Arc::new(config),
            attachments,
        }
    }
}
