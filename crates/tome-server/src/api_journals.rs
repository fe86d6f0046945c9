//! Journal and entry handlers.
//!
//! Mutations publish the resulting hub event after the database write
//! commits, so a viewer can only ever be told about state that exists.

use crate::hub::JournalEvent;
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
use tome_journals::{
    create_entry, create_journal, delete_entry, filter::visible_entries, get_journal,
    list_entries, list_journals, toggle_entry_privacy, update_entry_content, Journal,
    JournalEntry, JournalError,
};

/// Maximum length for a journal title.
const MAX_JOURNAL_TITLE_LEN: usize = 256;
/// Maximum length for an entry's content.
const MAX_ENTRY_CONTENT_LEN: usize = 65_536;

/// Maps a [`JournalError`] to the correct HTTP status code, logging 500s.
pub(crate) fn journal_err_to_status(e: JournalError) -> StatusCode {
    match e {
        JournalError::JournalNotFound(_) | JournalError::EntryNotFound(_) => StatusCode::NOT_FOUND,
        JournalError::NotAuthor => StatusCode::FORBIDDEN,
        JournalError::Validation(_) => StatusCode::BAD_REQUEST,
        ref err => {
            tracing::error!(error = %err, "journal operation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[derive(Deserialize)]
pub struct CreateJournalRequest {
    pub title: String,
}

#[derive(Deserialize)]
pub struct CreateEntryRequest {
    pub content: String,
    #[serde(default)]
    pub is_private: bool,
}

#[derive(Deserialize)]
pub struct UpdateEntryRequest {
    pub content: String,
}

/// POST /api/journals
pub async fn create_journal_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(IdentityContext(username)): Extension<IdentityContext>,
    Json(payload): Json<CreateJournalRequest>,
) -> Result<Json<Journal>, StatusCode> {
    if payload.title.len() > MAX_JOURNAL_TITLE_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }

    let journal = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get db connection for create_journal");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        create_journal(&conn, &payload.title, &username).map_err(journal_err_to_status)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "create_journal task join error");
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    tracing::info!(journal_id = journal.id, created_by = %journal.created_by, "created journal");
    Ok(Json(journal))
}

/// GET /api/journals
pub async fn list_journals_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<Journal>>, StatusCode> {
    let journals = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get db connection for list_journals");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        list_journals(&conn).map_err(journal_err_to_status)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "list_journals task join error");
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    Ok(Json(journals))
}

/// GET /api/journals/{id}
///
/// Returns the journal plus its entries, filtered down to what the viewer
/// may see. The same predicate gates the live broadcast, so this snapshot
/// and the event stream can never disagree about visibility.
pub async fn get_journal_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(journal_id): Path<i64>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let viewer = resolve_optional_identity(&state, &headers).await?;

    let (journal, entries) = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get db connection for get_journal");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        let journal = get_journal(&conn, journal_id).map_err(journal_err_to_status)?;
        let entries = list_entries(&conn, journal_id).map_err(journal_err_to_status)?;
        Ok::<_, StatusCode>((journal, visible_entries(entries, viewer.as_deref())))
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "get_journal task join error");
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    Ok(Json(json!({"journal": journal, "entries": entries})))
}

/// POST /api/journals/{id}/entries
pub async fn create_entry_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(IdentityContext(username)): Extension<IdentityContext>,
    Path(journal_id): Path<i64>,
    Json(payload): Json<CreateEntryRequest>,
) -> Result<Json<JournalEntry>, StatusCode> {
    if payload.content.len() > MAX_ENTRY_CONTENT_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }

    let pool = state.pool.clone();
    let entry = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get db connection for create_entry");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        create_entry(&conn, journal_id, &username, &payload.content, payload.is_private)
            .map_err(journal_err_to_status)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "create_entry task join error");
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    state
        .hub
        .publish(journal_id, &JournalEvent::EntryCreated(entry.clone()))
        .await;

    Ok(Json(entry))
}

/// PUT /api/journal-entries/{id}
pub async fn update_entry_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(IdentityContext(username)): Extension<IdentityContext>,
    Path(entry_id): Path<i64>,
    Json(payload): Json<UpdateEntryRequest>,
) -> Result<Json<JournalEntry>, StatusCode> {
    if payload.content.len() > MAX_ENTRY_CONTENT_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }

    let pool = state.pool.clone();
    let entry = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get db connection for update_entry");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        update_entry_content(&conn, entry_id, &username, &payload.content)
            .map_err(journal_err_to_status)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "update_entry task join error");
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    state
        .hub
        .publish(entry.journal_id, &JournalEvent::EntryUpdated(entry.clone()))
        .await;

    Ok(Json(entry))
}

/// PUT /api/journal-entries/{id}/privacy
///
/// Flips the privacy flag. The broadcast carries the new state: an entry
/// that just became public reaches subscribers who never saw it, while one
/// that just became private is from now on delivered to the author only.
pub async fn toggle_entry_privacy_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(IdentityContext(username)): Extension<IdentityContext>,
    Path(entry_id): Path<i64>,
) -> Result<Json<JournalEntry>, StatusCode> {
    let pool = state.pool.clone();
    let entry = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get db connection for toggle_entry_privacy");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        toggle_entry_privacy(&conn, entry_id, &username).map_err(journal_err_to_status)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "toggle_entry_privacy task join error");
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    state
        .hub
        .publish(entry.journal_id, &JournalEvent::EntryUpdated(entry.clone()))
        .await;

    Ok(Json(entry))
}

/// DELETE /api/journal-entries/{id}
pub async fn delete_entry_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(IdentityContext(username)): Extension<IdentityContext>,
    Path(entry_id): Path<i64>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let pool = state.pool.clone();
    let entry = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get db connection for delete_entry");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        delete_entry(&conn, entry_id, &username).map_err(journal_err_to_status)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "delete_entry task join error");
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    // The deleted entry's last-known privacy still gates who learns about it
    state
        .hub
        .publish(entry.journal_id, &JournalEvent::EntryDeleted(entry))
        .await;

    Ok(Json(json!({"status": "deleted"})))
}
