//! Tome server library logic.

pub mod api_auth;
pub mod api_journals;
pub mod api_pages;
pub mod api_ws;
pub mod config;
pub mod hub;
pub mod middleware;
pub mod notify;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tome_db::DbPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Fan-out hub for journal entry events.
    pub hub: hub::JournalHub,
    /// Derived HMAC key for bearer tokens.
    pub token_secret: [u8; 32],
    /// Lifetime of minted tokens in seconds.
    pub token_ttl_secs: u64,
    /// Delivery channel for page grant notifications.
    pub notifier: notify::SharedNotifier,
}

/// Maximum request body size (1 MiB). Protects against OOM from oversized payloads.
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/me", get(api_auth::me_handler))
        .route("/api/pages", post(api_pages::create_page_handler))
        .route("/api/pages/{slug}", put(api_pages::update_page_handler))
        .route(
            "/api/pages/{slug}/allow/{username}",
            post(api_pages::allow_user_handler),
        )
        .route(
            "/api/pages/{slug}/allowed",
            get(api_pages::list_allowed_handler),
        )
        .route("/api/journals", post(api_journals::create_journal_handler))
        .route(
            "/api/journals/{journalId}/entries",
            post(api_journals::create_entry_handler),
        )
        .route(
            "/api/journal-entries/{entryId}",
            put(api_journals::update_entry_handler).delete(api_journals::delete_entry_handler),
        )
        .route(
            "/api/journal-entries/{entryId}/privacy",
            put(api_journals::toggle_entry_privacy_handler),
        )
        .layer(axum::middleware::from_fn(middleware::auth_middleware));

    Router::new()
        .route("/health", get(health))
        .route("/api/register", post(api_auth::register_handler))
        .route("/api/login", post(api_auth::login_handler))
        .route("/api/pages/{slug}", get(api_pages::get_page_handler))
        .route("/api/journals", get(api_journals::list_journals_handler))
        .route(
            "/api/journals/{journalId}",
            get(api_journals::get_journal_handler),
        )
        .merge(protected_routes)
        .route("/ws/journals/{journalId}", get(api_ws::journal_ws_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
