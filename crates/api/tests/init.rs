//! Integration tests for database initialization and default-account seeding.

use assert_matches::assert_matches;
use sqlx::PgPool;
use tecwiki_api::auth::credentials::CredentialStore;
use tecwiki_api::error::AppError;
use tecwiki_api::init::{init_database, InitOutcome, SeedAccounts};
use tecwiki_core::attachments::AttachmentStore;
use tecwiki_core::error::CoreError;
use tecwiki_core::roles::Role;
use tecwiki_db::repositories::UserRepo;

fn seed() -> SeedAccounts {
    SeedAccounts {
        admin_password: "admin-password".into(),
        tecnico_password: Some("tecnico-password".into()),
        user_password: None,
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn init_without_seed_only_prepares(pool: PgPool) {
    let dir = tempfile::tempdir().unwrap();
    let attachments = AttachmentStore::new(dir.path().join("uploads"));

    let outcome = init_database(&pool, &attachments, None).await.unwrap();
    assert_eq!(outcome, InitOutcome::NoUsers);
    assert!(attachments.root().is_dir());
    assert!(UserRepo::list(&pool).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn seeding_creates_requested_accounts_once(pool: PgPool) {
    let dir = tempfile::tempdir().unwrap();
    let attachments = AttachmentStore::new(dir.path());

    let outcome = init_database(&pool, &attachments, Some(&seed())).await.unwrap();
    assert_eq!(
        outcome,
        InitOutcome::Seeded(vec!["admin".to_string(), "tecnico".to_string()])
    );

    let admin = CredentialStore::verify(&pool, "admin", "admin-password")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(admin.role().unwrap(), Role::Admin);
    let tecnico = UserRepo::find_by_username(&pool, "tecnico").await.unwrap().unwrap();
    assert_eq!(tecnico.role().unwrap(), Role::Tecnico);
    assert!(UserRepo::find_by_username(&pool, "usuario").await.unwrap().is_none());

    let again = init_database(&pool, &attachments, Some(&seed())).await.unwrap();
    assert_eq!(again, InitOutcome::AlreadyInitialized);
    assert_eq!(UserRepo::list(&pool).await.unwrap().len(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn weak_seed_password_creates_nothing(pool: PgPool) {
    let dir = tempfile::tempdir().unwrap();
    let attachments = AttachmentStore::new(dir.path());
    let weak = SeedAccounts {
        admin_password: "short".into(),
        ..seed()
    };

    assert_matches!(
        init_database(&pool, &attachments, Some(&weak)).await,
        Err(AppError::Core(CoreError::Validation(_)))
    );
    assert_eq!(UserRepo::count_admins(&pool).await.unwrap(), 0);
}
