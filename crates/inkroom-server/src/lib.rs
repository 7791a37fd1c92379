//! InkRoom WebSocket Relay Server
//!
//! Relays drawing events between clients in the same room and persists every
//! accepted event so late joiners can replay the board.
//!
//! ## Protocol
//!
//! Text frames carry JSON envelopes naming a channel:
//! ```json
//! { "event": "pen",    "data": { "x0": 0.1, "y0": 0.1, "x1": 0.2, "y1": 0.2, "color": "red" } }
//! { "event": "story",  "data": { "x": 0.4, "y": 0.3, "color": "black" } }
//! { "event": "update", "data": { "shapes": [ ... ] } }
//! ```
//!
//! The relay overwrites `timestamp` with its receipt time (Unix ms) and
//! forwards the frame to every other connection in the room.

pub mod config;
pub mod persist;
pub mod room;
pub mod state;
pub mod ws;

use axum::{Router, routing::get};
use state::{AppState, SharedState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use config::{ChannelSet, ConfigError, ServerConfig};

/// Build the router.
pub fn app(state: AppState) -> Router {
    router(Arc::new(state))
}

/// Build the router over state the caller keeps a handle to.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(ws::index))
        .route("/health", get(ws::health))
        .route("/ws", get(ws::ws_default))
        .route("/ws/{room}", get(ws::ws_room))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until the listener fails.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, app(state)).await
}
