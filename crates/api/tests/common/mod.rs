//! Shared helpers for the HTTP integration tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tempfile::TempDir;
use tower::ServiceExt;

use tecwiki_api::app::build_app;
use tecwiki_api::auth::password::hash_password;
use tecwiki_api::auth::session::{SessionConfig, SESSION_COOKIE};
use tecwiki_api::config::ServerConfig;
use tecwiki_api::state::AppState;
use tecwiki_core::roles::Role;
use tecwiki_db::models::user::{CreateUser, User};
use tecwiki_db::repositories::UserRepo;

/// Password given to every user created with [`seed_user`].
pub const TEST_PASSWORD: &str = "test_password_123";

/// Build a test `ServerConfig` storing uploads under `upload_dir`.
pub fn test_config(upload_dir: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        upload_dir: upload_dir.to_path_buf(),
        max_upload_bytes: 16 * 1024 * 1024,
        session: SessionConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            expiry_hours: 24,
            cookie_secure: false,
        },
    }
}

/// The application under test plus the temporary upload directory it
/// writes to (removed on drop).
pub struct TestApp {
    pub router: Router,
    pub uploads: TempDir,
}

impl TestApp {
    /// A fresh handle to the router; each request consumes one.
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Whether a stored reference (`uploads/<name>`) exists on disk.
    pub fn stored(&self, reference: &str) -> bool {
        let name = reference.strip_prefix("uploads/").unwrap_or(reference);
        self.uploads.path().join(name).is_file()
    }

    /// Number of files in the upload directory.
    pub fn stored_count(&self) -> usize {
        std::fs::read_dir(self.uploads.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

/// Build the full application (same middleware stack as production).
pub fn build_test_app(pool: PgPool) -> TestApp {
    let uploads = TempDir::new().expect("temp upload dir");
    let state = AppState::new(pool, test_config(uploads.path()));
    TestApp {
        router: build_app(state),
        uploads,
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Insert a user directly, with password [`TEST_PASSWORD`].
pub async fn seed_user(pool: &PgPool, username: &str, role: Role) -> User {
    let input = CreateUser {
        username: username.to_string(),
        password_hash: hash_password(TEST_PASSWORD).expect("hashing should succeed"),
        role,
    };
    UserRepo::create(pool, &input)
        .await
        .expect("user creation should succeed")
}

/// Log in through the API and return the `name=value` session cookie.
pub async fn login(app: Router, username: &str, password: &str) -> String {
    let body = serde_json::json!({ "username": username, "password": password });
    let response = post_json(app, "/api/auth/login", body, None).await;
    assert_eq!(response.status(), 200, "login of {username} should succeed");
    session_cookie(&response).expect("login must set the session cookie")
}

/// Seed a user and log them in, returning the user and their cookie.
pub async fn seed_and_login(test: &TestApp, pool: &PgPool, username: &str, role: Role) -> (User, String) {
    let user = seed_user(pool, username, role).await;
    let cookie = login(test.app(), username, TEST_PASSWORD).await;
    (user, cookie)
}

/// The `tecwiki_session=<token>` pair from a response's `Set-Cookie`.
pub fn session_cookie<B>(response: &Response<B>) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{SESSION_COOKIE}=")))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

fn request(method: Method, uri: &str, cookie: Option<&str>) -> axum::http::request::Builder {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}

/// Collect a response body.
pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes()
        .to_vec()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    get_auth(app, uri, None).await
}

pub async fn get_auth(app: Router, uri: &str, cookie: Option<&str>) -> Response<Body> {
    let req = request(Method::GET, uri, cookie)
        .body(Body::empty())
        .unwrap();
    app.oneshot(req).await.unwrap()
}

pub async fn delete(app: Router, uri: &str, cookie: Option<&str>) -> Response<Body> {
    let req = request(Method::DELETE, uri, cookie)
        .body(Body::empty())
        .unwrap();
    app.oneshot(req).await.unwrap()
}

pub async fn post_json(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    cookie: Option<&str>,
) -> Response<Body> {
    send_json(app, Method::POST, uri, body, cookie).await
}

pub async fn put_json(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    cookie: Option<&str>,
) -> Response<Body> {
    send_json(app, Method::PUT, uri, body, cookie).await
}

async fn send_json(
    app: Router,
    method: Method,
    uri: &str,
    body: serde_json::Value,
    cookie: Option<&str>,
) -> Response<Body> {
    let req = request(method, uri, cookie)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(req).await.unwrap()
}

// ---------------------------------------------------------------------------
// Multipart
// ---------------------------------------------------------------------------

const BOUNDARY: &str = "tecwiki-test-boundary";

/// One part of a multipart form.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Send a multipart form with `method` (POST or PUT).
pub async fn send_multipart(
    app: Router,
    method: Method,
    uri: &str,
    parts: &[Part<'_>],
    cookie: Option<&str>,
) -> Response<Body> {
    let req = request(method, uri, cookie)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap();
    app.oneshot(req).await.unwrap()
}
