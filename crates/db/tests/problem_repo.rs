//! Integration tests for the problems repository.

use sqlx::PgPool;
use tecwiki_core::roles::Role;
use tecwiki_db::models::problem::{CreateProblem, ProblemFilter, ProblemResponse, UpdateProblem};
use tecwiki_db::models::user::CreateUser;
use tecwiki_db::repositories::{ProblemRepo, UserRepo};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn seed_author(pool: &PgPool, username: &str) -> i64 {
    UserRepo::create(
        pool,
        &CreateUser {
            username: username.to_string(),
            password_hash: "hash".to_string(),
            role: Role::Tecnico,
        },
    )
    .await
    .unwrap()
    .id
}

fn new_problem(author_id: i64, title: &str, category: &str, tags: &str) -> CreateProblem {
    CreateProblem {
        title: title.to_string(),
        description: format!("{title} description"),
        category: category.to_string(),
        tags: tags.to_string(),
        files: vec![],
        youtube_link: None,
        author_id,
    }
}

fn titles(problems: Vec<tecwiki_db::models::problem::Problem>) -> Vec<String> {
    problems.into_iter().map(|p| p.title).collect()
}

// ---------------------------------------------------------------------------
// Create / read
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_then_fetch_returns_same_fields(pool: PgPool) {
    let author_id = seed_author(&pool, "tec").await;
    let input = CreateProblem {
        files: vec![
            "uploads/aaa_one.png".to_string(),
            "uploads/bbb_two.pdf".to_string(),
        ],
        youtube_link: Some("https://youtu.be/xyz".to_string()),
        ..new_problem(author_id, "Printer offline", "hardware", "printer,network")
    };

    let created = ProblemRepo::create(&pool, &input).await.unwrap();
    assert_eq!(created.author, "tec");
    assert_eq!(created.author_id, author_id);

    let fetched = ProblemRepo::find_by_id(&pool, created.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        ProblemResponse::from(fetched),
        ProblemResponse::from(created)
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_response_shape(pool: PgPool) {
    let author_id = seed_author(&pool, "tec").await;
    let created = ProblemRepo::create(&pool, &new_problem(author_id, "T", "c", "a,b"))
        .await
        .unwrap();

    let json = serde_json::to_value(ProblemResponse::from(created)).unwrap();
    assert_eq!(json["tags"], serde_json::json!(["a", "b"]));
    assert_eq!(json["files"], serde_json::json!([]));
    assert!(json["youtubeLink"].is_null());
    assert_eq!(json["author"], "tec");
    assert!(json.get("updated_at").is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_with_unknown_author_fails(pool: PgPool) {
    let result = ProblemRepo::create(&pool, &new_problem(999_999, "T", "c", "x")).await;
    assert!(result.is_err(), "Unknown author should violate the foreign key");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_find_missing_returns_none(pool: PgPool) {
    assert!(ProblemRepo::find_by_id(&pool, 999_999).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Listing and filters
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_list_newest_first(pool: PgPool) {
    let author_id = seed_author(&pool, "tec").await;
    for title in ["first", "second", "third"] {
        ProblemRepo::create(&pool, &new_problem(author_id, title, "c", "x"))
            .await
            .unwrap();
    }

    let all = ProblemRepo::list(&pool, &ProblemFilter::default())
        .await
        .unwrap();
    assert_eq!(titles(all), vec!["third", "second", "first"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_tag_filter_is_substring_match(pool: PgPool) {
    let author_id = seed_author(&pool, "tec").await;
    ProblemRepo::create(&pool, &new_problem(author_id, "algebra", "school", "math,algebra"))
        .await
        .unwrap();
    ProblemRepo::create(&pool, &new_problem(author_id, "applied", "school", "appliedmath"))
        .await
        .unwrap();
    ProblemRepo::create(&pool, &new_problem(author_id, "atoms", "school", "physics"))
        .await
        .unwrap();

    let filter = ProblemFilter {
        tag: Some("math".into()),
        category: None,
    };
    let mut found = titles(ProblemRepo::list(&pool, &filter).await.unwrap());
    found.sort();
    assert_eq!(found, vec!["algebra", "applied"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_category_filter_is_exact(pool: PgPool) {
    let author_id = seed_author(&pool, "tec").await;
    ProblemRepo::create(&pool, &new_problem(author_id, "a", "network", "x"))
        .await
        .unwrap();
    ProblemRepo::create(&pool, &new_problem(author_id, "b", "networking", "x"))
        .await
        .unwrap();

    let filter = ProblemFilter {
        tag: None,
        category: Some("network".into()),
    };
    assert_eq!(
        titles(ProblemRepo::list(&pool, &filter).await.unwrap()),
        vec!["a"]
    );

    let blank = ProblemFilter {
        tag: Some(String::new()),
        category: Some(String::new()),
    };
    assert_eq!(ProblemRepo::list(&pool, &blank).await.unwrap().len(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_categories_and_tags_are_distinct_and_sorted(pool: PgPool) {
    let author_id = seed_author(&pool, "tec").await;
    ProblemRepo::create(&pool, &new_problem(author_id, "a", "software", "os,boot"))
        .await
        .unwrap();
    ProblemRepo::create(&pool, &new_problem(author_id, "b", "hardware", "boot,cable"))
        .await
        .unwrap();
    ProblemRepo::create(&pool, &new_problem(author_id, "c", "software", "os"))
        .await
        .unwrap();

    assert_eq!(
        ProblemRepo::list_categories(&pool).await.unwrap(),
        vec!["hardware", "software"]
    );
    assert_eq!(
        ProblemRepo::list_tags(&pool).await.unwrap(),
        vec!["boot", "cable", "os"]
    );
}

// ---------------------------------------------------------------------------
// Update / delete
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_applies_partial_fields(pool: PgPool) {
    let author_id = seed_author(&pool, "tec").await;
    let created = ProblemRepo::create(
        &pool,
        &CreateProblem {
            youtube_link: Some("https://youtu.be/keep".into()),
            files: vec!["uploads/a_x.png".into()],
            ..new_problem(author_id, "Old title", "c", "x")
        },
    )
    .await
    .unwrap();

    let updated = ProblemRepo::update(
        &pool,
        created.id,
        &UpdateProblem {
            title: Some("New title".into()),
            files: vec!["uploads/a_x.png".into(), "uploads/b_y.pdf".into()],
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(updated.title, "New title");
    assert_eq!(updated.description, created.description);
    assert_eq!(updated.youtube_link.as_deref(), Some("https://youtu.be/keep"));
    assert_eq!(updated.files, vec!["uploads/a_x.png", "uploads/b_y.pdf"]);
    assert_eq!(updated.created_at, created.created_at);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_clears_and_sets_link(pool: PgPool) {
    let author_id = seed_author(&pool, "tec").await;
    let created = ProblemRepo::create(
        &pool,
        &CreateProblem {
            youtube_link: Some("https://youtu.be/old".into()),
            ..new_problem(author_id, "T", "c", "x")
        },
    )
    .await
    .unwrap();

    let cleared = ProblemRepo::update(
        &pool,
        created.id,
        &UpdateProblem {
            youtube_link: Some(None),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(cleared.youtube_link, None);

    let set = ProblemRepo::update(
        &pool,
        created.id,
        &UpdateProblem {
            youtube_link: Some(Some("https://youtu.be/new".into())),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(set.youtube_link.as_deref(), Some("https://youtu.be/new"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_missing_returns_none(pool: PgPool) {
    let result = ProblemRepo::update(&pool, 999_999, &UpdateProblem::default())
        .await
        .unwrap();
    assert!(result.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_failed_update_rolls_back(pool: PgPool) {
    let author_id = seed_author(&pool, "tec").await;
    let created = ProblemRepo::create(
        &pool,
        &CreateProblem {
            files: vec!["uploads/a_x.png".into()],
            ..new_problem(author_id, "T", "c", "x")
        },
    )
    .await
    .unwrap();

    let result = ProblemRepo::update(
        &pool,
        created.id,
        &UpdateProblem {
            title: Some("x".repeat(500)),
            files: vec![],
            ..Default::default()
        },
    )
    .await;
    assert!(result.is_err(), "Overlong title should violate the CHECK constraint");

    let unchanged = ProblemRepo::find_by_id(&pool, created.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged.title, "T");
    assert_eq!(unchanged.files, vec!["uploads/a_x.png"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_delete_problem(pool: PgPool) {
    let author_id = seed_author(&pool, "tec").await;
    let created = ProblemRepo::create(&pool, &new_problem(author_id, "T", "c", "x"))
        .await
        .unwrap();

    assert!(ProblemRepo::delete(&pool, created.id).await.unwrap());
    assert!(!ProblemRepo::delete(&pool, created.id).await.unwrap());
    assert_eq!(ProblemRepo::count_by_author(&pool, author_id).await.unwrap(), 0);
    assert!(UserRepo::delete(&pool, author_id).await.unwrap());
}
