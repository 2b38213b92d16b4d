//! Token issuance
//!
//! GET /token?expiresIn=<secs> - Issue an upload token

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::auth::IssuedToken;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    /// Lifetime in seconds; negative values give an expired token
    #[serde(rename = "expiresIn")]
    pub expires_in: Option<i64>,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub data: IssuedToken,
}

/// Create the token router
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(issue_token))
}

async fn issue_token(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Json<TokenResponse> {
    let purged = state.tokens().purge_expired();
    if purged > 0 {
        tracing::debug!(purged = purged, "Dropped expired tokens");
    }

    let ttl = query
        .expires_in
        .unwrap_or(state.config().auth.token_ttl_secs);

    Json(TokenResponse {
        data: state.tokens().issue(ttl),
    })
}
