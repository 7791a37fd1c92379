//! Annotation ("story") shape.

use super::{ShapeKind, ShapeTrait};
use crate::render::{Renderer, STROKE_WIDTH};
use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Serialize};

/// Annotation width as a fraction of the canvas width.
pub const ANNOTATION_WIDTH_FRACTION: f64 = 0.10;
/// Annotation height as a fraction of the canvas height.
pub const ANNOTATION_HEIGHT_FRACTION: f64 = 0.10;

/// A fixed-size rectangular marker placed at a point.
///
/// The box size is not stored: it is always a fixed fraction of whatever canvas
/// the annotation is shown on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Top-left corner, device pixels.
    pub origin: Point,
    /// Unused; kept so drags move both points uniformly.
    pub endpoint: Point,
    pub color: String,
    /// Reserved, always empty.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl Annotation {
    /// Create a new annotation at `origin`.
    pub fn new(origin: Point, color: impl Into<String>) -> Self {
        Self {
            origin,
            endpoint: origin,
            color: color.into(),
            text: String::new(),
            timestamp: None,
        }
    }

    /// Box size on a canvas of the given size.
    pub fn box_size(canvas: Size) -> Size {
        Size::new(
            canvas.width * ANNOTATION_WIDTH_FRACTION,
            canvas.height * ANNOTATION_HEIGHT_FRACTION,
        )
    }
}

impl ShapeTrait for Annotation {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Annotation
    }

    fn bounds(&self, canvas: Size) -> Rect {
        Rect::from_origin_size(self.origin, Self::box_size(canvas))
    }

    fn contains(&self, point: Point, canvas: Size) -> bool {
        let size = Self::box_size(canvas);
        (self.origin.x <= point.x)
            && (self.origin.x + size.width >= point.x)
            && (self.origin.y <= point.y)
            && (self.origin.y + size.height >= point.y)
    }

    fn draw(&self, renderer: &mut dyn Renderer, canvas: Size) {
        renderer.stroke_rect(self.bounds(canvas), &self.color, STROKE_WIDTH);
    }
}
