use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tecwiki_api::init::{init_database, InitOutcome, SeedAccounts};
use tecwiki_core::attachments::AttachmentStore;

#[derive(Parser)]
#[command(name = "tecwiki-init")]
#[command(about = "Prepare the TecWiki database and upload directory", long_about = None)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", help = "Postgres connection URL")]
    database_url: String,

    #[arg(long, env = "UPLOAD_DIR", default_value = "uploads", help = "Attachment directory")]
    upload_dir: PathBuf,

    #[arg(long, help = "Create the default admin, tecnico and usuario accounts")]
    seed: bool,

    #[arg(
        long,
        env = "TECWIKI_ADMIN_PASSWORD",
        hide_env_values = true,
        help = "Password for 'admin'"
    )]
    admin_password: Option<String>,

    #[arg(
        long,
        env = "TECWIKI_TECNICO_PASSWORD",
        hide_env_values = true,
        help = "Password for 'tecnico' (skipped if absent)"
    )]
    tecnico_password: Option<String>,

    #[arg(
        long,
        env = "TECWIKI_USER_PASSWORD",
        hide_env_values = true,
        help = "Password for 'usuario' (skipped if absent)"
    )]
    user_password: Option<String>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "tecwiki_api=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let seed = match (cli.seed, cli.admin_password) {
        (false, _) => None,
        (true, Some(admin_password)) => Some(SeedAccounts {
            admin_password,
            tecnico_password: cli.tecnico_password,
            user_password: cli.user_password,
        }),
        (true, None) => {
            eprintln!("--seed requires --admin-password or TECWIKI_ADMIN_PASSWORD");
            std::process::exit(2);
        }
    };

    let pool = tecwiki_db::create_pool(&cli.database_url)
        .await
        .expect("Failed to connect to database");
    let attachments = AttachmentStore::new(cli.upload_dir);

    match init_database(&pool, &attachments, seed.as_ref()).await {
        Ok(InitOutcome::Seeded(accounts)) => {
            println!("Database initialized. Created: {}", accounts.join(", "));
        }
        Ok(InitOutcome::NoUsers) => {
            println!("Database initialized without users.");
            println!("Use POST /api/setup to create the administrator.");
        }
        Ok(InitOutcome::AlreadyInitialized) => {
            println!("Database already initialized with users.");
        }
        Err(e) => {
            eprintln!("Initialization failed: {e}");
            std::process::exit(1);
        }
    }
}
