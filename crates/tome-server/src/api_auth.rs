//! Registration, login, and identity introspection handlers.

use crate::middleware::IdentityContext;
use crate::AppState;
use axum::{
    extract::Extension,
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tome_auth::{AuthError, User};

/// Maps an [`AuthError`] to the correct HTTP status code, logging 500s.
pub(crate) fn auth_err_to_status(e: AuthError) -> StatusCode {
    match e {
        AuthError::NotFound(_) => StatusCode::NOT_FOUND,
        AuthError::UsernameTaken => StatusCode::CONFLICT,
        AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AuthError::Validation(_) => StatusCode::BAD_REQUEST,
        ref err => {
            tracing::error!(error = %err, "auth operation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

/// POST /api/register
pub async fn register_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<Json<User>, StatusCode> {
    let user = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get db connection for register");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        tome_auth::create_user(&conn, &payload.username, &payload.password)
            .map_err(auth_err_to_status)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "register task join error");
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    tracing::info!(username = %user.username, "registered new user");
    Ok(Json(user))
}

/// POST /api/login
pub async fn login_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let pool = state.pool.clone();
    let user = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get db connection for login");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        tome_auth::verify_credentials(&conn, &payload.username, &payload.password)
            .map_err(auth_err_to_status)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "login task join error");
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    let token = tome_auth::mint_token(&user.username, &state.token_secret, state.token_ttl_secs);
    Ok(Json(json!({
        "token": token,
        "expires_in_secs": state.token_ttl_secs,
    })))
}

/// GET /api/me
pub async fn me_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(IdentityContext(username)): Extension<IdentityContext>,
) -> Result<Json<User>, StatusCode> {
    let user = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get db connection for me");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        tome_auth::get_user(&conn, &username).map_err(auth_err_to_status)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "me task join error");
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    Ok(Json(user))
}
