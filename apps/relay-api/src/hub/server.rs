//! WebSocket upgrade handler and per-connection read/write loops.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::error::ApiError;
use crate::AppState;

use super::registry::Role;
use super::room::Room;
use super::DEFAULT_ROOM;

#[derive(Debug, Deserialize)]
struct WsQuery {
    role: String,
    room: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}

/// Role validation happens before the upgrade: a bad or missing `role`
/// selector is a plain HTTP 400 and no socket is ever established.
async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let role = Role::parse(&query.role)
        .ok_or_else(|| ApiError::bad_request("role must be 'subscriber' or 'peer'"))?;

    let room = state
        .rooms
        .get_or_create(query.room.as_deref().unwrap_or(DEFAULT_ROOM));

    Ok(ws
        .on_upgrade(move |socket| handle_connection(socket, room, role))
        .into_response())
}

async fn handle_connection(socket: WebSocket, room: Arc<Room>, role: Role) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let id = room.join(role, tx).await;

    // Writer task: drain the outbound queue into the socket. Ends when the
    // queue closes (connection removed) or the peer stops accepting writes.
    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!(%e, "failed to encode outbound event");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    // Read loop: frames from this connection are processed in arrival order.
    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => room.handle_frame(&id, &text),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                // Errored and closed connections share the same cleanup.
                tracing::debug!(connection = %id, %e, "ws read error");
                break;
            }
        }
    }

    room.leave(&id);
    writer.abort();
}
