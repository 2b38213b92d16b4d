//! Upload tokens
//!
//! Optional bearer-style tokens gating the file routes. Tokens are random
//! UUIDs held in memory with an expiry; nothing survives a restart.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// A freshly issued token
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// In-memory token table
#[derive(Clone, Default)]
pub struct TokenStore {
    tokens: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token valid for `ttl_secs`. A negative TTL yields a token that
    /// is already expired.
    pub fn issue(&self, ttl_secs: i64) -> IssuedToken {
        let token = Uuid::new_v4().to_string();
        let expires_at = Utc::now() + Duration::seconds(ttl_secs);

        self.tokens.write().insert(token.clone(), expires_at);
        tracing::debug!(expires_at = %expires_at, "Token issued");

        IssuedToken { token, expires_at }
    }

    /// Check a token, dropping it if it has expired
    pub fn validate(&self, token: &str) -> bool {
        let expires_at = match self.tokens.read().get(token) {
            Some(expires_at) => *expires_at,
            None => return false,
        };

        if expires_at <= Utc::now() {
            self.tokens.write().remove(token);
            return false;
        }
        true
    }

    /// Drop all expired tokens, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut tokens = self.tokens.write();
        let before = tokens.len();
        tokens.retain(|_, expires_at| *expires_at > now);
        before - tokens.len()
    }
}

/// Extract the token from an `Authorization` header value
pub fn token_from_header(value: &str) -> &str {
    let value = value.trim();
    value.strip_prefix("Bearer ").unwrap_or(value).trim()
}

/// Reject requests without a valid token when tokens are enabled
pub async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state.config().auth.use_token {
        return Ok(next.run(request).await);
    }

    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(token_from_header)
        .is_some_and(|token| state.tokens().validate(token));

    if !authorized {
        tracing::debug!(uri = %request.uri(), "Rejected request without valid token");
        return Err(AppError::Unauthorized);
    }
    Ok(next.run(request).await)
}
