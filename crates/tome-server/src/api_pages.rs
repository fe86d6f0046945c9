//! Page CRUD and allow-list handlers.
//!
//! Every access decision is evaluated against the page and its allow-list
//! *before* any mutation runs; a denied write leaves the database untouched.
//! 403 responses carry no body, so a denied viewer learns nothing about the
//! allow-list or the page contents.

use crate::middleware::{resolve_optional_identity, IdentityContext};
use crate::AppState;
use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tome_pages::{
    access, create_page, get_page, grant_access, list_allowed, update_page, CreatePageParams,
    Page, PageError, SidebarFact, UpdatePageParams,
};
use tome_types::{EditPolicy, Visibility};

/// Maximum length for a page title.
const MAX_TITLE_LEN: usize = 256;
/// Maximum length for page content.
const MAX_CONTENT_LEN: usize = 262_144;
/// Maximum number of sidebar facts on a single page.
const MAX_FACTS: usize = 64;

/// Maps a [`PageError`] to the correct HTTP status code, logging 500s.
pub(crate) fn page_err_to_status(e: PageError) -> StatusCode {
    match e {
        PageError::NotFound(_) => StatusCode::NOT_FOUND,
        PageError::SlugTaken(_) => StatusCode::CONFLICT,
        PageError::Validation(_) => StatusCode::BAD_REQUEST,
        ref err => {
            tracing::error!(error = %err, "page operation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn validate_title(title: &str) -> Result<(), StatusCode> {
    if title.trim().is_empty() || title.len() > MAX_TITLE_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(())
}

fn validate_content(content: &str) -> Result<(), StatusCode> {
    if content.len() > MAX_CONTENT_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(())
}

fn validate_facts(facts: &[SidebarFact]) -> Result<(), StatusCode> {
    if facts.len() > MAX_FACTS {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(())
}

#[derive(Deserialize)]
pub struct CreatePageRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub facts: Vec<SidebarFact>,
    pub visibility: Option<Visibility>,
    pub edit_policy: Option<EditPolicy>,
}

#[derive(Deserialize, Default)]
pub struct UpdatePageRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub facts: Option<Vec<SidebarFact>>,
    pub visibility: Option<Visibility>,
    pub edit_policy: Option<EditPolicy>,
}

/// POST /api/pages
pub async fn create_page_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(IdentityContext(username)): Extension<IdentityContext>,
    Json(payload): Json<CreatePageRequest>,
) -> Result<Json<Page>, StatusCode> {
    validate_title(&payload.title)?;
    validate_content(&payload.content)?;
    validate_facts(&payload.facts)?;

    let params = CreatePageParams {
        title: payload.title,
        content: payload.content,
        facts: payload.facts,
        visibility: payload.visibility.unwrap_or(Visibility::Public),
        edit_policy: payload.edit_policy.unwrap_or(EditPolicy::OwnerOnly),
        owner: username,
    };

    let page = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get db connection for create_page");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        create_page(&conn, &params).map_err(page_err_to_status)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "create_page task join error");
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    tracing::info!(slug = %page.slug, owner = %page.owner, "created page");
    Ok(Json(page))
}

/// GET /api/pages/{slug}
///
/// Serves anonymous viewers; a present-but-invalid token is rejected.
pub async fn get_page_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<Json<Page>, StatusCode> {
    let viewer = resolve_optional_identity(&state, &headers).await?;

    let page = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get db connection for get_page");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        let page = get_page(&conn, &slug).map_err(page_err_to_status)?;
        let allow_list = list_allowed(&conn, page.id).map_err(page_err_to_status)?;
        if !access::can_read(&page, &allow_list, viewer.as_deref()) {
            return Err(StatusCode::FORBIDDEN);
        }
        Ok(page)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "get_page task join error");
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    Ok(Json(page))
}

/// PUT /api/pages/{slug}
///
/// Content edits are gated by the edit policy; visibility and edit-policy
/// changes are owner-only regardless of the policy.
pub async fn update_page_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(IdentityContext(username)): Extension<IdentityContext>,
    Path(slug): Path<String>,
    Json(payload): Json<UpdatePageRequest>,
) -> Result<Json<Page>, StatusCode> {
    if let Some(ref title) = payload.title {
        validate_title(title)?;
    }
    if let Some(ref content) = payload.content {
        validate_content(content)?;
    }
    if let Some(ref facts) = payload.facts {
        validate_facts(facts)?;
    }

    let params = UpdatePageParams {
        title: payload.title,
        content: payload.content,
        facts: payload.facts,
        visibility: payload.visibility,
        edit_policy: payload.edit_policy,
    };

    let page = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get db connection for update_page");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

        let page = get_page(&conn, &slug).map_err(page_err_to_status)?;
        let allow_list = list_allowed(&conn, page.id).map_err(page_err_to_status)?;

        let allowed = if params.touches_settings() {
            access::can_manage(&page, Some(&username))
        } else {
            access::can_edit(&page, &allow_list, Some(&username))
        };
        if !allowed {
            return Err(StatusCode::FORBIDDEN);
        }

        update_page(&conn, &slug, &params).map_err(page_err_to_status)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "update_page task join error");
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    Ok(Json(page))
}

/// POST /api/pages/{slug}/allow/{username}
///
/// Owner-only, idempotent. A first-time grant triggers the notifier;
/// regranting an already-allowed user does not.
pub async fn allow_user_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(IdentityContext(granter)): Extension<IdentityContext>,
    Path((slug, target)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let pool = state.pool.clone();
    let slug_clone = slug.clone();
    let target_clone = target.clone();

    let inserted = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get db connection for allow_user");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

        let page = get_page(&conn, &slug_clone).map_err(page_err_to_status)?;
        if !access::can_manage(&page, Some(&granter)) {
            return Err(StatusCode::FORBIDDEN);
        }

        // The grant target must be a real account
        tome_auth::get_user(&conn, &target_clone)
            .map_err(crate::api_auth::auth_err_to_status)?;

        grant_access(&conn, page.id, &target_clone).map_err(page_err_to_status)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "allow_user task join error");
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    if inserted {
        state.notifier.notify_grant(&target, &slug);
    }

    Ok(Json(json!({"status": "granted"})))
}

/// GET /api/pages/{slug}/allowed
pub async fn list_allowed_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(IdentityContext(username)): Extension<IdentityContext>,
    Path(slug): Path<String>,
) -> Result<Json<Vec<String>>, StatusCode> {
    let allow_list = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get db connection for list_allowed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

        let page = get_page(&conn, &slug).map_err(page_err_to_status)?;
        let allow_list = list_allowed(&conn, page.id).map_err(page_err_to_status)?;
        if !access::can_read(&page, &allow_list, Some(&username)) {
            return Err(StatusCode::FORBIDDEN);
        }
        Ok(allow_list)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "list_allowed task join error");
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    Ok(Json(allow_list))
}
