//! WebSocket endpoint for live journal subscriptions.
//!
//! `GET /ws/journals/{id}?token=...` — the token is optional: without one
//! the viewer subscribes anonymously and receives public entries only. A
//! token that fails verification is rejected with 401 rather than silently
//! downgraded to anonymous.

use crate::AppState;
use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        Extension, Path, Query, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Ceiling on a single socket write. A consumer that cannot take a frame
/// within this window is disconnected; its queue (capacity
/// [`crate::hub::SUBSCRIBER_QUEUE_CAPACITY`]) has already absorbed any
/// normal burst.
const SOCKET_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Query parameters for the journal WebSocket connection.
#[derive(Debug, Deserialize)]
pub struct WsConnectParams {
    pub token: Option<String>,
}

/// WebSocket handler: `GET /ws/journals/{id}?token=...`.
pub async fn journal_ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(journal_id): Path<i64>,
    Query(params): Query<WsConnectParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let viewer = match params.token {
        Some(ref token) => {
            match tome_auth::verify_token(token, &state.token_secret) {
                Ok(username) => Some(username),
                Err(e) => {
                    tracing::warn!(journal_id, "websocket token verification failed: {}", e);
                    return StatusCode::UNAUTHORIZED.into_response();
                }
            }
        }
        None => None,
    };

    tracing::info!(
        journal_id,
        viewer = viewer.as_deref().unwrap_or("<anonymous>"),
        "journal websocket connected"
    );
    ws.on_upgrade(move |socket| handle_socket(socket, state, journal_id, viewer))
}

/// Runs one journal subscription: registers with the hub, drains the
/// outbound queue to the socket, and deregisters on any exit path.
async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    journal_id: i64,
    viewer: Option<String>,
) {
    let (mut sender, mut receiver) = socket.split();

    let (subscription_id, mut rx) = state.hub.subscribe(journal_id, viewer.clone()).await;

    // Writer task: queue -> socket, bounded per-write so one stuck client
    // cannot pin the queue forever.
    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let write = tokio::time::timeout(
                SOCKET_WRITE_TIMEOUT,
                sender.send(WsMessage::Text(frame.into())),
            )
            .await;
            match write {
                Ok(Ok(())) => {}
                Ok(Err(_)) => break,
                Err(_) => {
                    tracing::warn!(journal_id, "journal websocket write timed out");
                    break;
                }
            }
        }
    });

    // Viewers only listen; anything but a close frame is ignored.
    while let Some(Ok(msg)) = receiver.next().await {
        if let WsMessage::Close(_) = msg {
            break;
        }
    }

    state.hub.unsubscribe(journal_id, subscription_id).await;
    send_task.abort();

    tracing::info!(
        journal_id,
        viewer = viewer.as_deref().unwrap_or("<anonymous>"),
        "journal websocket disconnected"
    );
}
