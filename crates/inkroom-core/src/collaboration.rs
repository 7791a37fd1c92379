//! Bridge between local canvas state and the relay.
//!
//! Outbound: committed shapes are normalized against the local viewport and
//! handed to the transport without waiting for delivery. Inbound: payloads are
//! denormalized against the local viewport and appended (or, for snapshots,
//! swapped in wholesale).

use crate::canvas::CanvasState;
use crate::shapes::Shape;
use crate::sync::{
    ConnectionState, SnapshotRecord, SyncError, SyncEvent, SyncResult, Transport, WireEvent,
};
use crate::viewport::Viewport;
use serde_json::Value;

/// Client side of board synchronization.
pub struct SyncClient<T: Transport> {
    transport: T,
    /// Publish the whole board on `update` after a drag.
    legacy_snapshot: bool,
    /// Connection state reported by the last poll.
    last_state: ConnectionState,
}

impl<T: Transport> SyncClient<T> {
    pub fn new(transport: T) -> Self {
        let last_state = transport.state();
        Self {
            transport,
            legacy_snapshot: true,
            last_state,
        }
    }

    /// Enable or disable the post-drag snapshot broadcast.
    pub fn with_legacy_snapshot(mut self, enabled: bool) -> Self {
        self.legacy_snapshot = enabled;
        self
    }

    pub fn legacy_snapshot(&self) -> bool {
        self.legacy_snapshot
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.last_state
    }

    // --- Outbound ---

    /// Publish one locally committed shape on its kind's channel.
    ///
    /// Failures are logged and swallowed; the local shape stays.
    pub fn emit(&mut self, shape: &Shape, viewport: &Viewport) {
        let event = WireEvent::from_shape(shape, viewport);
        self.send(&event);
    }

    /// Publish the whole board on the `update` channel.
    pub fn emit_snapshot(&mut self, shapes: &[Shape], viewport: &Viewport) {
        let event = WireEvent::Update(SnapshotRecord::from_shapes(shapes, viewport));
        self.send(&event);
    }

    /// Called when a local drag ends.
    pub fn on_move_finished(&mut self, canvas: &CanvasState) {
        if self.legacy_snapshot {
            self.emit_snapshot(canvas.shapes(), canvas.viewport());
        }
    }

    fn send(&mut self, event: &WireEvent) {
        if let Err(e) = self.transport.send(event) {
            log::warn!("Failed to publish {} event: {}", event.channel(), e);
        }
    }

    // --- Inbound ---

    /// Apply one payload received on `channel` to the canvas.
    ///
    /// Malformed payloads and unknown channels leave the canvas untouched and
    /// are returned as errors.
    pub fn on_receive(
        &mut self,
        channel: &str,
        payload: Value,
        canvas: &mut CanvasState,
    ) -> SyncResult<()> {
        let event = WireEvent::from_parts(channel, payload)?;
        Self::handle_event(&event, canvas);
        Ok(())
    }

    /// Apply an already decoded event.
    pub fn handle_event(event: &WireEvent, canvas: &mut CanvasState) {
        let viewport = *canvas.viewport();
        match event {
            WireEvent::Pen(record) => {
                canvas.push(Shape::Stroke(record.to_stroke(&viewport)));
            }
            WireEvent::Story(record) => {
                canvas.push(Shape::Annotation(record.to_annotation(&viewport)));
            }
            WireEvent::Update(record) => {
                let mut shapes = record.to_shapes(&viewport);
                for shape in &mut shapes {
                    shape.set_timestamp(record.timestamp);
                }
                canvas.replace_all(shapes);
            }
        }
    }

    /// Drain the transport and apply everything that arrived.
    ///
    /// Returns the number of events applied.
    pub fn poll(&mut self, canvas: &mut CanvasState) -> usize {
        let mut applied = 0;
        for event in self.transport.poll_events() {
            match event {
                SyncEvent::Connected => {
                    log::info!("Connected to relay");
                    self.last_state = ConnectionState::Connected;
                }
                SyncEvent::Disconnected => {
                    log::info!("Disconnected from relay");
                    self.last_state = ConnectionState::Disconnected;
                }
                SyncEvent::Error { message } => {
                    log::error!("Relay connection error: {}", message);
                    self.last_state = ConnectionState::Error;
                }
                SyncEvent::Received { channel, payload } => {
                    match self.on_receive(&channel, payload, canvas) {
                        Ok(()) => applied += 1,
                        Err(SyncError::UnknownChannel(name)) => {
                            log::debug!("Ignoring event on unknown channel {}", name);
                        }
                        Err(e) => log::warn!("Dropping {} event: {}", channel, e),
                    }
                }
            }
        }
        applied
    }
}
