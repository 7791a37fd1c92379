//! Wire protocol and WebSocket transport for board synchronization.
//!
//! Every frame is a JSON envelope naming a channel and carrying its payload:
//!
//! ```json
//! { "event": "pen",    "data": { "x0": 0.1, "y0": 0.1, "x1": 0.2, "y1": 0.2, "color": "red" } }
//! { "event": "story",  "data": { "x": 0.4, "y": 0.3, "color": "black" } }
//! { "event": "update", "data": { "shapes": [ { "type": "line", "x0": 0.1, ... } ] } }
//! ```
//!
//! Payload coordinates are always fractions of the sender's canvas. Fields a
//! payload carries beyond the known set are kept and re-serialized untouched.

use crate::shapes::{Annotation, Shape, ShapeKind, Stroke};
use crate::viewport::Viewport;
use kurbo::Point;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Synchronization errors.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The connection is gone or the frame could not be handed to it.
    #[error("Transport error: {0}")]
    Transport(String),
    /// An inbound frame or payload was malformed.
    #[error("Protocol decode error: {0}")]
    Decode(String),
    /// A frame named a channel this protocol does not know.
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),
    #[error("Encode error: {0}")]
    Encode(String),
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Named event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Single stroke segments.
    Pen,
    /// Annotation boxes.
    Story,
    /// Legacy full-board snapshots.
    Update,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Pen, Channel::Story, Channel::Update];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Pen => "pen",
            Channel::Story => "story",
            Channel::Update => "update",
        }
    }

    /// Channel carrying incremental events for a shape kind.
    pub fn for_kind(kind: ShapeKind) -> Self {
        match kind {
            ShapeKind::Stroke => Channel::Pen,
            ShapeKind::Annotation => Channel::Story,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pen" => Ok(Channel::Pen),
            "story" => Ok(Channel::Story),
            "update" => Ok(Channel::Update),
            other => Err(SyncError::UnknownChannel(other.to_string())),
        }
    }
}

fn default_color() -> String {
    crate::shapes::DEFAULT_COLOR.to_string()
}

/// Accept any JSON value for `timestamp`; only an integer survives.
/// Older clients send ISO date strings.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(|v| v.as_i64()))
}

/// `pen` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeRecord {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    #[serde(default = "default_color")]
    pub color: String,
    /// Relay receipt time (Unix ms). Clients leave it unset.
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StrokeRecord {
    /// Normalize a local stroke against the sender's viewport.
    pub fn from_stroke(stroke: &Stroke, viewport: &Viewport) -> Self {
        let from = viewport.to_fraction(stroke.origin);
        let to = viewport.to_fraction(stroke.endpoint);
        Self {
            x0: from.x,
            y0: from.y,
            x1: to.x,
            y1: to.y,
            color: stroke.color.clone(),
            timestamp: None,
            extra: Map::new(),
        }
    }

    /// Denormalize against the receiver's viewport.
    pub fn to_stroke(&self, viewport: &Viewport) -> Stroke {
        let mut stroke = Stroke::new(
            viewport.to_device(Point::new(self.x0, self.y0)),
            viewport.to_device(Point::new(self.x1, self.y1)),
            self.color.clone(),
        );
        stroke.timestamp = self.timestamp;
        stroke
    }
}

/// `story` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AnnotationRecord {
    pub fn from_annotation(note: &Annotation, viewport: &Viewport) -> Self {
        let at = viewport.to_fraction(note.origin);
        Self {
            x: at.x,
            y: at.y,
            color: note.color.clone(),
            timestamp: None,
            extra: Map::new(),
        }
    }

    pub fn to_annotation(&self, viewport: &Viewport) -> Annotation {
        let mut note = Annotation::new(
            viewport.to_device(Point::new(self.x, self.y)),
            self.color.clone(),
        );
        note.timestamp = self.timestamp;
        note
    }
}

/// One shape inside an `update` snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotShape {
    #[serde(rename = "type")]
    pub kind: ShapeKind,
    pub x0: f64,
    pub y0: f64,
    #[serde(default)]
    pub x1: f64,
    #[serde(default)]
    pub y1: f64,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SnapshotShape {
    pub fn from_shape(shape: &Shape, viewport: &Viewport) -> Self {
        let from = viewport.to_fraction(shape.origin());
        let to = viewport.to_fraction(shape.endpoint());
        Self {
            kind: shape.kind(),
            x0: from.x,
            y0: from.y,
            x1: to.x,
            y1: to.y,
            color: shape.color().to_string(),
            text: shape.text().to_string(),
            extra: Map::new(),
        }
    }

    pub fn to_shape(&self, viewport: &Viewport) -> Shape {
        Shape::create(
            self.kind,
            Some(&self.color),
            viewport.to_device(Point::new(self.x0, self.y0)),
            Some(viewport.to_device(Point::new(self.x1, self.y1))),
            Some(self.text.clone()),
        )
    }
}

/// `update` payload: the sender's whole board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub shapes: Vec<SnapshotShape>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SnapshotRecord {
    pub fn from_shapes(shapes: &[Shape], viewport: &Viewport) -> Self {
        Self {
            shapes: shapes
                .iter()
                .map(|s| SnapshotShape::from_shape(s, viewport))
                .collect(),
            timestamp: None,
            extra: Map::new(),
        }
    }

    pub fn to_shapes(&self, viewport: &Viewport) -> Vec<Shape> {
        self.shapes.iter().map(|s| s.to_shape(viewport)).collect()
    }
}

/// A decoded frame: one event on one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum WireEvent {
    Pen(StrokeRecord),
    Story(AnnotationRecord),
    Update(SnapshotRecord),
}

impl WireEvent {
    /// Build the incremental event for a locally committed shape.
    pub fn from_shape(shape: &Shape, viewport: &Viewport) -> Self {
        match shape {
            Shape::Stroke(s) => WireEvent::Pen(StrokeRecord::from_stroke(s, viewport)),
            Shape::Annotation(a) => {
                WireEvent::Story(AnnotationRecord::from_annotation(a, viewport))
            }
        }
    }

    /// Decode a payload received on a named channel.
    pub fn from_parts(channel: &str, payload: Value) -> SyncResult<Self> {
        let decode = |e: serde_json::Error| SyncError::Decode(format!("{channel}: {e}"));
        match channel.parse::<Channel>()? {
            Channel::Pen => serde_json::from_value(payload).map(WireEvent::Pen).map_err(decode),
            Channel::Story => serde_json::from_value(payload).map(WireEvent::Story).map_err(decode),
            Channel::Update => {
                serde_json::from_value(payload).map(WireEvent::Update).map_err(decode)
            }
        }
    }

    /// Decode a full text frame.
    pub fn from_json(text: &str) -> SyncResult<Self> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(|e| SyncError::Decode(e.to_string()))?;
        Self::from_parts(&envelope.event, envelope.data)
    }

    /// Encode as a text frame.
    pub fn to_json(&self) -> SyncResult<String> {
        serde_json::to_string(self).map_err(|e| SyncError::Encode(e.to_string()))
    }

    pub fn channel(&self) -> Channel {
        match self {
            WireEvent::Pen(_) => Channel::Pen,
            WireEvent::Story(_) => Channel::Story,
            WireEvent::Update(_) => Channel::Update,
        }
    }

    pub fn timestamp(&self) -> Option<i64> {
        match self {
            WireEvent::Pen(r) => r.timestamp,
            WireEvent::Story(r) => r.timestamp,
            WireEvent::Update(r) => r.timestamp,
        }
    }

    /// Overwrite the timestamp, whatever the sender put there.
    pub fn stamp(&mut self, timestamp: i64) {
        match self {
            WireEvent::Pen(r) => r.timestamp = Some(timestamp),
            WireEvent::Story(r) => r.timestamp = Some(timestamp),
            WireEvent::Update(r) => r.timestamp = Some(timestamp),
        }
    }
}

/// Loosely typed frame, used to split channel from payload before decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events from a transport
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Connected to server; history replay follows.
    Connected,
    /// Disconnected from server
    Disconnected,
    /// A frame arrived on a channel. The payload is not decoded yet.
    Received { channel: String, payload: Value },
    /// Error occurred
    Error { message: String },
}

/// Bidirectional named-event channel to the relay.
///
/// The relay never echoes a sender's own events, so implementations do not
/// filter them.
pub trait Transport {
    /// Hand one event to the connection. Does not wait for delivery.
    fn send(&mut self, event: &WireEvent) -> SyncResult<()>;

    /// Drain pending events (non-blocking), in arrival order.
    fn poll_events(&mut self) -> Vec<SyncEvent>;

    fn state(&self) -> ConnectionState;
}

/// Split a text frame into a `SyncEvent::Received`, or `None` if the frame is
/// not an envelope at all.
fn received_from_text(text: &str) -> Option<SyncEvent> {
    match serde_json::from_str::<Envelope>(text) {
        Ok(envelope) => Some(SyncEvent::Received {
            channel: envelope.event,
            payload: envelope.data,
        }),
        Err(e) => {
            log::warn!("Dropping malformed frame: {}", e);
            None
        }
    }
}

// ============================================================================
// Native WebSocket Client
// ============================================================================

mod native_client {
    use super::*;
    use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tungstenite::{Message, connect};
    use url::Url;

    /// Commands sent to the WebSocket thread.
    enum WsCommand {
        Send(String),
        Close,
    }

    /// WebSocket client for native platforms.
    ///
    /// Uses a background thread for non-blocking operation.
    pub struct NativeWebSocket {
        state: ConnectionState,
        events: Vec<SyncEvent>,
        /// Channel to send commands to the WebSocket thread.
        cmd_tx: Option<Sender<WsCommand>>,
        /// Channel to receive events from the WebSocket thread.
        event_rx: Option<Receiver<SyncEvent>>,
        /// Handle to the WebSocket thread.
        _thread: Option<JoinHandle<()>>,
    }

    impl NativeWebSocket {
        /// Create a new disconnected WebSocket client.
        pub fn new() -> Self {
            Self {
                state: ConnectionState::Disconnected,
                events: Vec::new(),
                cmd_tx: None,
                event_rx: None,
                _thread: None,
            }
        }

        /// Connect to a relay endpoint such as `ws://localhost:3000/ws/boards`.
        pub fn connect(&mut self, url: &str) -> SyncResult<()> {
            if self.cmd_tx.is_some() {
                return Err(SyncError::Transport("Already connected".to_string()));
            }

            let parsed_url =
                Url::parse(url).map_err(|e| SyncError::Transport(format!("Invalid URL: {}", e)))?;
            if parsed_url.scheme() != "ws" && parsed_url.scheme() != "wss" {
                return Err(SyncError::Transport(format!(
                    "Invalid WebSocket URL scheme: {}",
                    parsed_url.scheme()
                )));
            }

            self.state = ConnectionState::Connecting;

            let (cmd_tx, cmd_rx) = channel::<WsCommand>();
            let (event_tx, event_rx) = channel::<SyncEvent>();

            let url = url.to_string();

            let handle = thread::spawn(move || {
                log::info!("WebSocket thread: connecting to {}", url);

                match connect(&url) {
                    Ok((mut socket, response)) => {
                        log::info!("WebSocket connected, status: {}", response.status());
                        let _ = event_tx.send(SyncEvent::Connected);

                        // Short read timeout so outgoing commands are serviced promptly.
                        if let tungstenite::stream::MaybeTlsStream::Plain(tcp) = socket.get_mut() {
                            let _ = tcp.set_read_timeout(Some(Duration::from_millis(20)));
                            let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
                        }

                        loop {
                            match cmd_rx.try_recv() {
                                Ok(WsCommand::Send(msg)) => {
                                    log::debug!("WebSocket sending {} bytes", msg.len());
                                    if let Err(e) = socket.send(Message::Text(msg)) {
                                        log::error!("WebSocket send error: {}", e);
                                        break;
                                    }
                                    continue;
                                }
                                Ok(WsCommand::Close) => {
                                    log::info!("WebSocket close requested");
                                    let _ = socket.close(None);
                                    break;
                                }
                                Err(TryRecvError::Disconnected) => {
                                    log::info!("WebSocket command channel disconnected");
                                    break;
                                }
                                Err(TryRecvError::Empty) => {}
                            }

                            match socket.read() {
                                Ok(Message::Text(txt)) => {
                                    log::debug!("WebSocket received {} bytes", txt.len());
                                    if let Some(event) = received_from_text(&txt) {
                                        let _ = event_tx.send(event);
                                    }
                                }
                                Ok(Message::Ping(data)) => {
                                    let _ = socket.send(Message::Pong(data));
                                }
                                Ok(Message::Close(_)) => {
                                    log::info!("WebSocket received close frame");
                                    break;
                                }
                                Ok(_) => {}
                                Err(tungstenite::Error::Io(ref e))
                                    if e.kind() == std::io::ErrorKind::WouldBlock
                                        || e.kind() == std::io::ErrorKind::TimedOut =>
                                {
                                    continue;
                                }
                                Err(e) => {
                                    log::error!("WebSocket read error: {}", e);
                                    break;
                                }
                            }
                        }

                        log::info!("WebSocket thread exiting");
                        let _ = event_tx.send(SyncEvent::Disconnected);
                    }
                    Err(e) => {
                        log::error!("WebSocket connection failed: {}", e);
                        let _ = event_tx.send(SyncEvent::Error {
                            message: format!("Connection failed: {}", e),
                        });
                    }
                }
            });

            self.cmd_tx = Some(cmd_tx);
            self.event_rx = Some(event_rx);
            self._thread = Some(handle);

            Ok(())
        }

        /// Disconnect from the server.
        pub fn disconnect(&mut self) {
            if let Some(tx) = self.cmd_tx.take() {
                let _ = tx.send(WsCommand::Close);
            }
            self.event_rx = None;
            self._thread = None;
            self.state = ConnectionState::Disconnected;
        }

        /// Check if connected.
        pub fn is_connected(&self) -> bool {
            self.state == ConnectionState::Connected
        }
    }

    impl Transport for NativeWebSocket {
        fn send(&mut self, event: &WireEvent) -> SyncResult<()> {
            let Some(ref tx) = self.cmd_tx else {
                return Err(SyncError::Transport("Not connected".to_string()));
            };
            let frame = event.to_json()?;
            tx.send(WsCommand::Send(frame))
                .map_err(|e| SyncError::Transport(format!("Send failed: {}", e)))
        }

        fn poll_events(&mut self) -> Vec<SyncEvent> {
            if let Some(ref rx) = self.event_rx {
                while let Ok(event) = rx.try_recv() {
                    match &event {
                        SyncEvent::Connected => self.state = ConnectionState::Connected,
                        SyncEvent::Disconnected => self.state = ConnectionState::Disconnected,
                        SyncEvent::Error { .. } => self.state = ConnectionState::Error,
                        _ => {}
                    }
                    self.events.push(event);
                }
            }

            std::mem::take(&mut self.events)
        }

        fn state(&self) -> ConnectionState {
            self.state
        }
    }

    impl Default for NativeWebSocket {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for NativeWebSocket {
        fn drop(&mut self) {
            self.disconnect();
        }
    }
}

pub use native_client::NativeWebSocket;
