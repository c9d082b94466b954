use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use tokio::sync::broadcast::error::RecvError;

use super::AppState;
use crate::live::{PushMessage, Session};

pub async fn live_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_session(socket, state))
}

/// Sends the current list on connect, then every published full state until
/// either side goes away.
async fn serve_session(mut socket: WebSocket, state: AppState) {
    // Subscribe first so a change landing during the snapshot read is still
    // delivered afterwards.
    let Session { id, mut updates } = state.broadcaster.connect();

    match snapshot(&state).await {
        Some(payload) => {
            if socket.send(Message::Text(payload.into())).await.is_err() {
                tracing::debug!(session_id = id, "Session closed before snapshot");
                return;
            }
        }
        None => tracing::warn!(session_id = id, "No snapshot sent; waiting for the next change"),
    }

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(payload) => {
                    if socket.send(Message::Text(payload.to_string().into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(session_id = id, skipped, "Session lagged; skipping to newest state");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::debug!(session_id = id, "Live session disconnected");
}

async fn snapshot(state: &AppState) -> Option<String> {
    let tasks = match state.service.list_tasks().await {
        Ok(tasks) => tasks,
        Err(e) => {
            tracing::error!(error = %e, "Failed to read tasks for snapshot");
            return None;
        }
    };
    match (PushMessage::FullState { tasks: &tasks }).to_payload() {
        Ok(payload) => Some(payload.to_string()),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize snapshot");
            None
        }
    }
}
