//! One client's drawing session: canvas, tools, throttle and sync wired together.

use crate::canvas::CanvasState;
use crate::collaboration::SyncClient;
use crate::input::{PointerEvent, Throttle};
use crate::render::Renderer;
use crate::sync::Transport;
use crate::tools::{Action, ToolKind, ToolManager};
use crate::viewport::Viewport;
use std::time::{Duration, Instant};

/// How often the host should call [`ClientSession::tick`].
pub const REDRAW_INTERVAL: Duration = Duration::from_millis(30);

/// A connected drawing client.
pub struct ClientSession<T: Transport> {
    canvas: CanvasState,
    tools: ToolManager,
    sync: SyncClient<T>,
    throttle: Throttle,
}

impl<T: Transport> ClientSession<T> {
    pub fn new(transport: T, viewport: Viewport) -> Self {
        Self::with_sync(SyncClient::new(transport), viewport)
    }

    pub fn with_sync(sync: SyncClient<T>, viewport: Viewport) -> Self {
        Self {
            canvas: CanvasState::new(viewport),
            tools: ToolManager::new(),
            sync,
            throttle: Throttle::default(),
        }
    }

    /// Replace the move throttle.
    pub fn with_throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn canvas(&self) -> &CanvasState {
        &self.canvas
    }

    pub fn tools(&self) -> &ToolManager {
        &self.tools
    }

    pub fn sync(&self) -> &SyncClient<T> {
        &self.sync
    }

    pub fn sync_mut(&mut self) -> &mut SyncClient<T> {
        &mut self.sync
    }

    pub fn set_tool(&mut self, tool: ToolKind) {
        self.tools.set_tool(tool);
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.tools.set_color(color);
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.canvas.resize(width, height);
    }

    /// Feed one pointer event received at `now`.
    ///
    /// Moves arriving faster than the throttle allows are dropped. Committed
    /// shapes are appended locally first, then published.
    pub fn handle_pointer(&mut self, event: PointerEvent, now: Instant) {
        if event.is_move() && !self.throttle.admit(now) {
            return;
        }

        match self.tools.handle(event, &mut self.canvas) {
            Some(Action::Commit(shape)) => {
                self.sync.emit(&shape, self.canvas.viewport());
                self.canvas.push(shape);
            }
            Some(Action::MoveFinished) => self.sync.on_move_finished(&self.canvas),
            None => {}
        }
    }

    /// Apply inbound events, then repaint if anything changed.
    ///
    /// Returns true if the canvas was repainted.
    pub fn tick(&mut self, renderer: &mut dyn Renderer) -> bool {
        self.sync.poll(&mut self.canvas);
        self.canvas.redraw(renderer)
    }
}
