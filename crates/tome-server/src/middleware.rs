//! Request authentication.
//!
//! Protected routes sit behind [`auth_middleware`], which requires a valid
//! `Authorization: Bearer <token>` header and stores the resolved username
//! in request extensions. Read paths that also serve anonymous viewers call
//! [`resolve_optional_identity`] instead: no credentials means anonymous,
//! but credentials that fail verification are rejected rather than quietly
//! downgraded.

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::AppState;

/// The authenticated username, stored in request extensions.
#[derive(Clone, Debug)]
pub struct IdentityContext(pub String);

/// Extracts the bearer token from the `Authorization` header, if present.
fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, StatusCode> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;
    value
        .strip_prefix("Bearer ")
        .map(Some)
        .ok_or(StatusCode::UNAUTHORIZED)
}

/// Verifies a token and confirms the bound user still exists.
async fn resolve_token(state: Arc<AppState>, token: &str) -> Result<String, StatusCode> {
    let username =
        tome_auth::verify_token(token, &state.token_secret).map_err(|_| StatusCode::UNAUTHORIZED)?;

    // The token is signed, but the account may have been created against a
    // different database. Any failure reads as unauthorized.
    let confirmed = tokio::task::spawn_blocking(move || {
        let conn = state
            .pool
            .get()
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        tome_auth::get_user(&conn, &username)
            .map(|user| user.username)
            .map_err(|_| StatusCode::UNAUTHORIZED)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    Ok(confirmed)
}

/// Middleware requiring a valid bearer token. Inserts [`IdentityContext`].
pub async fn auth_middleware(mut req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let token = bearer_token(req.headers())?
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_string();

    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?
        .clone();

    let username = resolve_token(state, &token).await?;
    req.extensions_mut().insert(IdentityContext(username));

    Ok(next.run(req).await)
}

/// Resolves the viewer for endpoints that serve anonymous readers.
///
/// Absent credentials resolve to `None`; present-but-invalid credentials
/// are a 401, never a silent downgrade to anonymous.
pub async fn resolve_optional_identity(
    state: &Arc<AppState>,
    headers: &HeaderMap,
) -> Result<Option<String>, StatusCode> {
    match bearer_token(headers)? {
        Some(token) => resolve_token(state.clone(), token).await.map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_absent_header_is_anonymous() {
        let headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers).unwrap(), None);
    }

    #[test]
    fn bearer_token_extracts_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers).unwrap(), Some("abc123"));
    }

    #[test]
    fn bearer_token_rejects_other_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers).unwrap_err(), StatusCode::UNAUTHORIZED);
    }
}
