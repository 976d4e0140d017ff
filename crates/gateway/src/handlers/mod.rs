//! HTTP request handlers

pub mod files;
pub mod health;
pub mod query;
pub mod upload;

use axum::http::HeaderMap;
use uuid::Uuid;

/// Header callers may use to pin their session
pub const SESSION_HEADER: &str = "session-id";

/// Resolve the session id: explicit value, then header, then a fresh UUID
pub fn resolve_session_id(headers: &HeaderMap, explicit: Option<String>) -> String {
    explicit
        .filter(|s| !s.trim().is_empty())
        .or_else(|| {
            headers
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
