//! Session credentials for the deletion endpoint.
//!
//! The endpoint authenticates with the browser session: the full cookie
//! header, the CSRF token mirrored from the `ct0` cookie, and the web
//! client's bearer token.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::config::SessionConfig;

/// Bearer token shipped with the public web client.
pub const DEFAULT_BEARER_TOKEN: &str = "Bearer AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";

/// Cookie carrying the CSRF token.
pub const CSRF_COOKIE: &str = "ct0";

static BEARER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Bearer\s([A-Za-z0-9%]+={0,2})").expect("bearer pattern is valid")
});

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No session cookie configured (set session.cookie)")]
    MissingCookie,

    #[error("CSRF token not found: the session cookie has no '{CSRF_COOKIE}' entry")]
    MissingCsrfToken,

    #[error("Bearer token is malformed")]
    InvalidBearer,
}

/// Resolved credentials sent with every deletion request.
#[derive(Clone)]
pub struct Credentials {
    pub cookie: String,
    pub csrf_token: String,
    pub authorization: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("cookie", &"<redacted>")
            .field("csrf_token", &"<redacted>")
            .field("authorization", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn from_config(config: &SessionConfig) -> Result<Self, SessionError> {
        let cookie = config
            .cookie
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(SessionError::MissingCookie)?;

        let csrf_token = config
            .csrf_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| cookie_value(cookie, CSRF_COOKIE))
            .ok_or(SessionError::MissingCsrfToken)?;

        let authorization = match config.bearer_token.as_deref() {
            Some(raw) => normalize_bearer(raw).ok_or(SessionError::InvalidBearer)?,
            None => DEFAULT_BEARER_TOKEN.to_string(),
        };

        Ok(Self {
            cookie: cookie.to_string(),
            csrf_token: csrf_token.to_string(),
            authorization,
        })
    }
}

/// Value of cookie `name` in a `Cookie` header string.
pub fn cookie_value<'a>(cookie: &'a str, name: &str) -> Option<&'a str> {
    cookie
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

/// Accepts a bare token, a `Bearer <token>` value, or any text containing
/// one (such as a saved page script).
pub fn normalize_bearer(raw: &str) -> Option<String> {
    if let Some(caps) = BEARER.captures(raw) {
        return Some(format!("Bearer {}", &caps[1]));
    }

    let token = raw.trim();
    let valid = !token.is_empty()
        && token
            .trim_end_matches('=')
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'%');
    valid.then(|| format!("Bearer {token}"))
}
