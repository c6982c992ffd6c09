//! Session tokens and the session cookie.
//!
//! A session token is an HS256-signed JWT carrying [`Claims`]. Each token is
//! backed by a `user_sessions` row keyed by the SHA-256 of its `jti`, so a
//! token stops working as soon as its row is revoked (logout) even though
//! the signature is still valid.
//!
//! The token travels in the `tecwiki_session` cookie; an
//! `Authorization: Bearer <token>` header is accepted as well.

use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tecwiki_core::types::DbId;
use uuid::Uuid;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "tecwiki_session";

/// Default session lifetime in hours.
const DEFAULT_EXPIRY_HOURS: i64 = 24;

/// JWT claims embedded in every session token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject -- the user's internal database id.
    pub sub: DbId,
    /// The user's role name at login time. Informational only; requests
    /// are authorized with the role currently stored for the user.
    pub role: String,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Unique token identifier (UUID v4); its hash keys the session row.
    pub jti: String,
}

/// Session signing and cookie settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// HMAC-SHA256 secret used to sign and verify tokens.
    pub secret: String,
    /// Session lifetime in hours (default: 24).
    pub expiry_hours: i64,
    /// Whether the cookie carries the `Secure` attribute (default: false).
    pub cookie_secure: bool,
}

impl SessionConfig {
    /// Load session configuration from environment variables.
    ///
    /// | Env Var                 | Required | Default |
    /// |-------------------------|----------|---------|
    /// | `SESSION_SECRET`        | **yes**  | --      |
    /// | `SESSION_EXPIRY_HOURS`  | no       | `24`    |
    /// | `SESSION_COOKIE_SECURE` | no       | `false` |
    ///
    /// # Panics
    ///
    /// Panics if `SESSION_SECRET` is not set or is empty, or if a numeric or
    /// boolean value does not parse.
    pub fn from_env() -> Self {
        let secret =
            std::env::var("SESSION_SECRET").expect("SESSION_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "SESSION_SECRET must not be empty");

        let expiry_hours: i64 = std::env::var("SESSION_EXPIRY_HOURS")
            .unwrap_or_else(|_| DEFAULT_EXPIRY_HOURS.to_string())
            .parse()
            .expect("SESSION_EXPIRY_HOURS must be a valid i64");
        assert!(expiry_hours > 0, "SESSION_EXPIRY_HOURS must be positive");

        let cookie_secure: bool = std::env::var("SESSION_COOKIE_SECURE")
            .unwrap_or_else(|_| "false".into())
            .parse()
            .expect("SESSION_COOKIE_SECURE must be true or false");

        Self {
            secret,
            expiry_hours,
            cookie_secure,
        }
    }

    /// Session lifetime as a duration.
    pub fn lifetime(&self) -> Duration {
        Duration::hours(self.expiry_hours)
    }
}

/// A freshly signed token and the data needed to persist its session row.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    /// SHA-256 hex digest of the token's `jti`.
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Sign a session token for the given user.
pub fn issue_token(
    user_id: DbId,
    role: &str,
    config: &SessionConfig,
) -> Result<IssuedToken, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expires_at = now + config.lifetime();
    let jti = Uuid::new_v4().to_string();

    let claims = Claims {
        sub: user_id,
        role: role.to_string(),
        exp: expires_at.timestamp(),
        iat: now.timestamp(),
        jti,
    };
    let token = encode(
        &Header::default(), // HS256
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )?;

    Ok(IssuedToken {
        token,
        token_hash: hash_token_id(&claims.jti),
        expires_at,
    })
}

/// Validate signature and expiry, returning the embedded [`Claims`].
pub fn validate_token(
    token: &str,
    config: &SessionConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(), // HS256, validates exp
    )?;
    Ok(token_data.claims)
}

/// SHA-256 hex digest of a token identifier.
pub fn hash_token_id(jti: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(jti.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Read the value of cookie `name` from the request headers.
pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
}

/// The session token presented by the request: the session cookie, or a
/// Bearer token when no cookie is present.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = parse_cookie(headers, SESSION_COOKIE).filter(|t| !t.is_empty()) {
        return Some(token);
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// `Set-Cookie` value installing `token` as the session cookie.
pub fn session_cookie(token: &str, config: &SessionConfig) -> String {
    let max_age = config.lifetime().num_seconds();
    let secure = if config.cookie_secure { "; Secure" } else { "" };
    format!("{SESSION_COOKIE}={token}; HttpOnly{secure}; SameSite=Lax; Path=/; Max-Age={max_age}")
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(config: &SessionConfig) -> String {
    let secure = if config.cookie_secure { "; Secure" } else { "" };
    format!(
        "{SESSION_COOKIE}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0; \
         HttpOnly{secure}; SameSite=Lax; Path=/"
    )
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn test_config() -> SessionConfig {
        SessionConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            expiry_hours: 24,
            cookie_secure: false,
        }
    }

    #[test]
    fn test_issue_and_validate_token() {
        let config = test_config();
        let issued = issue_token(42, "tecnico", &config).expect("token generation should succeed");

        let claims = validate_token(&issued.token, &config).expect("validation should succeed");
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, "tecnico");
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
        assert_eq!(issued.token_hash, hash_token_id(&claims.jti));
        assert_eq!(issued.token_hash.len(), 64);
    }

    #[test]
    fn test_expired_token_fails() {
        let config = test_config();
        // Well past the default 60-second leeway.
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: 1,
            role: "user".to_string(),
            exp: now - 300,
            iat: now - 600,
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();

        assert!(validate_token(&token, &config).is_err());
    }

    #[test]
    fn test_different_secret_fails() {
        let issued = issue_token(1, "user", &test_config()).unwrap();
        let other = SessionConfig {
            secret: "another-secret".to_string(),
            ..test_config()
        };
        assert!(validate_token(&issued.token, &other).is_err());
    }

    #[test]
    fn test_parse_cookie_among_several() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; tecwiki_session=abc.def.ghi; lang=pt"),
        );
        assert_eq!(
            parse_cookie(&headers, SESSION_COOKIE).as_deref(),
            Some("abc.def.ghi")
        );
        assert_eq!(parse_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_cookie_takes_precedence_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("from-header"));

        headers.insert(COOKIE, HeaderValue::from_static("tecwiki_session=from-cookie"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn test_no_token_without_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(token_from_headers(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(token_from_headers(&headers), None);
    }

    #[test]
    fn test_cookie_attributes() {
        let config = test_config();
        let cookie = session_cookie("tok", &config);
        assert!(cookie.starts_with("tecwiki_session=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(!cookie.contains("Secure"));

        let secure = SessionConfig {
            cookie_secure: true,
            ..config
        };
        assert!(clear_session_cookie(&secure).contains("; Secure"));
        assert!(clear_session_cookie(&secure).contains("Max-Age=0"));
    }
}
