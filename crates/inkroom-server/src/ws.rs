//! HTTP and WebSocket handlers.

use crate::room::Room;
use crate::state::SharedState;
use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use inkroom_core::sync::WireEvent;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Index page
pub async fn index() -> &'static str {
    "InkRoom Relay Server - Connect via WebSocket at /ws or /ws/{room}"
}

/// Health check
pub async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade into the default room.
pub async fn ws_default(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    let room = state.default_room.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, state, room))
}

/// WebSocket upgrade into a named room.
pub async fn ws_room(
    ws: WebSocketUpgrade,
    Path(room): Path<String>,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, room))
}

/// Handle a WebSocket connection: replay, then relay until either side closes.
async fn handle_socket(socket: WebSocket, state: SharedState, room_name: String) {
    let peer = Uuid::new_v4().to_string();

    let (mut sender, mut receiver) = socket.split();
    let (room, mut rx, history) = state.join(&room_name, &peer).await;
    info!(room = %room_name, peer = %peer, replay = history.len(), "peer joined");

    let mut open = true;
    for frame in history {
        if sender.send(Message::Text(frame.into())).await.is_err() {
            open = false;
            break;
        }
    }

    while open {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(&state, &room, &peer, text.as_str()).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // Ignore binary and ping/pong
                    Some(Err(e)) => {
                        warn!(room = %room_name, peer = %peer, error = %e, "websocket error");
                        break;
                    }
                }
            }

            frame = rx.recv() => {
                match frame {
                    Ok(frame) => {
                        // Don't echo back to sender
                        if frame.from != peer
                            && sender.send(Message::Text(frame.text.into())).await.is_err()
                        {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // Skipped frames are gone; the peer must rejoin and replay.
                        warn!(room = %room_name, peer = %peer, skipped, "peer fell behind, closing");
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    state.leave(&room, &peer).await;
    info!(room = %room_name, peer = %peer, "connection closed");
}

/// Decode, filter and publish one inbound text frame.
async fn handle_frame(state: &SharedState, room: &Room, peer: &str, text: &str) {
    let event = match WireEvent::from_json(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(room = %room.name(), peer, error = %e, "dropping malformed frame");
            return;
        }
    };

    let channel = event.channel();
    if !state.channels.contains(channel) {
        debug!(room = %room.name(), peer, channel = %channel, "dropping event on disabled channel");
        return;
    }

    match room.publish(peer, event).await {
        Ok(stamp) => debug!(room = %room.name(), peer, channel = %channel, stamp, "relayed event"),
        Err(e) => warn!(room = %room.name(), peer, error = %e, "failed to encode event"),
    }
}
