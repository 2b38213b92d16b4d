//! File Store Server Library
//!
//! An in-memory file store reachable over HTTP. Clients upload whole files or
//! numbered fragments, query size and chunk metadata, download, and delete.
//!
//! # Modules
//!
//! - `store`: registry, fragment naming/discovery and assembly
//! - `service`: typed operations called by the HTTP layer
//! - `routes`: axum handlers
//! - `auth`: optional upload tokens
//! - `throttle`: slow ingestion for upload testing

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;
pub mod throttle;

use axum::{extract::DefaultBodyLimit, middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use state::AppState;

/// Build the application router around `state`
pub fn build_router(state: AppState) -> Router {
    let config = state.config();

    let files = routes::files::router()
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ))
        .layer(DefaultBodyLimit::max(config.upload.max_body_bytes));

    let route = config::normalize_route(&config.server.route);
    let router = Router::new()
        .nest("/health", routes::health::router())
        .nest("/token", routes::token::router());

    let router = if route.is_empty() {
        router.merge(files)
    } else {
        router.nest(&format!("/{}", route), files)
    };

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
