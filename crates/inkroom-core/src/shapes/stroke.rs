//! Stroke shape.

use super::{ShapeKind, ShapeTrait};
use crate::render::{Renderer, STROKE_WIDTH};
use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Serialize};

/// One straight segment of a freehand pen gesture.
///
/// A continuous gesture commits many of these, one per processed pointer move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    /// Start point, device pixels.
    pub origin: Point,
    /// End point, device pixels.
    pub endpoint: Point,
    pub color: String,
    /// Reserved, always empty.
    #[serde(default)]
    pub text: String,
    /// Relay receipt time (Unix ms).
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl Stroke {
    /// Create a new stroke segment.
    pub fn new(origin: Point, endpoint: Point, color: impl Into<String>) -> Self {
        Self {
            origin,
            endpoint,
            color: color.into(),
            text: String::new(),
            timestamp: None,
        }
    }
}

impl ShapeTrait for Stroke {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Stroke
    }

    fn bounds(&self, _canvas: Size) -> Rect {
        Rect::from_points(self.origin, self.endpoint)
    }

    /// Degenerate hit test: the y interval `(origin.y, origin.y]` is empty, so
    /// this never reports a hit. Strokes therefore cannot be picked with the
    /// move tool; only annotations can.
    fn contains(&self, point: Point, _canvas: Size) -> bool {
        (self.origin.x < point.x)
            && (self.endpoint.x >= point.x)
            && (self.origin.y < point.y)
            && (self.origin.y >= point.y)
    }

    fn draw(&self, renderer: &mut dyn Renderer, _canvas: Size) {
        renderer.draw_line(self.origin, self.endpoint, &self.color, STROKE_WIDTH);
    }
}
