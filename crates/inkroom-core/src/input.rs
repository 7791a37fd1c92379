//! Pointer input events and move throttling.

use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Default minimum interval between processed pointer moves.
pub const DEFAULT_MOVE_INTERVAL: Duration = Duration::from_millis(10);

/// Pointer event in device pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down { position: Point },
    Move { position: Point },
    Up { position: Point },
    /// Pointer left the canvas; handled like `Up`.
    Out { position: Point },
}

impl PointerEvent {
    pub fn position(&self) -> Point {
        match *self {
            PointerEvent::Down { position }
            | PointerEvent::Move { position }
            | PointerEvent::Up { position }
            | PointerEvent::Out { position } => position,
        }
    }

    pub fn is_move(&self) -> bool {
        matches!(self, PointerEvent::Move { .. })
    }
}

/// Leading-edge throttle.
///
/// The first call always passes; afterwards a call passes only if at least
/// `interval` has elapsed since the last call that passed. Rejected calls are
/// dropped, not queued.
///
/// Creation time does not count as a call. A throttle seeded at creation
/// would drop moves arriving within `interval` of it; this one admits them.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(DEFAULT_MOVE_INTERVAL)
    }
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Decide whether an event arriving at `now` should be processed.
    pub fn admit(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}
