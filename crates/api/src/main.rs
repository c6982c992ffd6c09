use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tecwiki_api::app::build_app;
use tecwiki_api::config::ServerConfig;
use tecwiki_api::state::AppState;
use tecwiki_db::repositories::UserRepo;
use tecwiki_db::DbPool;

const DEFAULT_LOG_FILTER: &str = "tecwiki_api=debug,tecwiki_core=debug,tower_http=debug";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = config.port,
        upload_dir = %config.upload_dir.display(),
        max_upload_bytes = config.max_upload_bytes,
        "Loaded server configuration"
    );
    let addr = SocketAddr::new(
        config.host.parse().expect("HOST must be an IP address"),
        config.port,
    );

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = prepare_database(&database_url).await;
    report_admin_setup(&pool).await;

    let state = AppState::new(pool, config);
    state
        .attachments
        .ensure_root()
        .await
        .expect("Upload directory must be creatable");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");
    tracing::info!(%addr, "TecWiki API listening");

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server stopped");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Connect, verify connectivity and bring the schema up to date. Any failure
/// aborts startup.
async fn prepare_database(database_url: &str) -> DbPool {
    let pool = tecwiki_db::create_pool(database_url)
        .await
        .expect("Failed to connect to database");
    tecwiki_db::health_check(&pool)
        .await
        .expect("Database is not answering");
    tecwiki_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");
    pool
}

/// Remind the operator when the first administrator has not been created yet.
async fn report_admin_setup(pool: &DbPool) {
    match UserRepo::count_admins(pool).await {
        Ok(0) => tracing::warn!("No administrator configured; POST /api/setup to create one"),
        Ok(admins) => tracing::debug!(admins, "Administrators present"),
        Err(e) => tracing::error!(error = %e, "Failed to count administrators"),
    }
}

/// Resolve on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("SIGINT received, shutting down"),
            _ = terminate.recv() => tracing::info!("SIGTERM received, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Ctrl-C received, shutting down");
    }
}
