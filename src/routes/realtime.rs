// SPDX-License-Identifier: MIT

//! Websocket route: live message events for a group.
//!
//! The socket is receive-only; clients post messages through the REST
//! endpoint and see them (and everyone else's) arrive here.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
    routing::get,
    Extension, Router,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::routes::groups::require_membership;
use crate::services::ChannelEvent;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/groups/{id}/ws", get(group_ws))
}

/// Upgrade to a websocket subscribed to the group's channel (members only).
async fn group_ws(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(group_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response> {
    require_membership(&state, &group_id, &user.account_id).await?;

    tracing::debug!(group_id = %group_id, user_id = %user.account_id, "Websocket subscribed");

    Ok(ws.on_upgrade(move |socket| stream_events(state, group_id, socket)))
}

/// Forward channel events to the socket until the client goes away.
async fn stream_events(state: Arc<AppState>, group_id: String, socket: WebSocket) {
    let mut rx = state.realtime.subscribe(&group_id);
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = rx.recv() => {
                let event = match event {
                    Ok(ChannelEvent::Probe) => continue,
                    Ok(event) => event,
                    // Lagged: the client missed events; history backfills them
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                };

                let Ok(payload) = serde_json::to_string(&event) else {
                    continue;
                };
                if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                    break;
                }
            }
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                    // Inbound frames (pings, stray text) are ignored
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    drop(rx);
    state.realtime.prune(&group_id);

    tracing::debug!(group_id = %group_id, "Websocket closed");
}
