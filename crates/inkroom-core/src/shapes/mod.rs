//! Shape definitions for the board.

mod annotation;
mod stroke;

pub use annotation::{ANNOTATION_HEIGHT_FRACTION, ANNOTATION_WIDTH_FRACTION, Annotation};
pub use stroke::Stroke;

use crate::render::Renderer;
use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Color used when a shape is created without one.
pub const DEFAULT_COLOR: &str = "#AAAAAA";

/// Tag identifying the kind of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    /// One straight segment of a freehand pen gesture.
    #[serde(rename = "line")]
    Stroke,
    /// A fixed-size "story" marker box.
    #[serde(rename = "story")]
    Annotation,
}

impl ShapeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ShapeKind::Stroke => "line",
            ShapeKind::Annotation => "story",
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShapeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "line" | "pen" | "stroke" => Ok(ShapeKind::Stroke),
            "story" | "annotation" => Ok(ShapeKind::Annotation),
            other => Err(format!("unknown shape kind: {other}")),
        }
    }
}

/// Common trait for all shapes.
///
/// Every coordinate seen through this trait is in device pixels; `canvas` is
/// the current canvas size of the client doing the work.
pub trait ShapeTrait {
    fn kind(&self) -> ShapeKind;

    /// Bounding box in device pixels.
    fn bounds(&self, canvas: Size) -> Rect;

    /// Check if a device point hits this shape.
    fn contains(&self, point: Point, canvas: Size) -> bool;

    /// Paint the shape.
    fn draw(&self, renderer: &mut dyn Renderer, canvas: Size);
}

/// Closed set of drawable entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Stroke(Stroke),
    Annotation(Annotation),
}

impl Shape {
    /// Build a shape of the given kind.
    ///
    /// `color` defaults to [`DEFAULT_COLOR`], `endpoint` to `origin`, `text`
    /// to empty. Nothing is validated: off-canvas origins are accepted.
    pub fn create(
        kind: ShapeKind,
        color: Option<&str>,
        origin: Point,
        endpoint: Option<Point>,
        text: Option<String>,
    ) -> Self {
        let color = color.unwrap_or(DEFAULT_COLOR).to_string();
        let endpoint = endpoint.unwrap_or(origin);
        let text = text.unwrap_or_default();
        match kind {
            ShapeKind::Stroke => Shape::Stroke(Stroke {
                origin,
                endpoint,
                color,
                text,
                timestamp: None,
            }),
            ShapeKind::Annotation => Shape::Annotation(Annotation {
                origin,
                endpoint,
                color,
                text,
                timestamp: None,
            }),
        }
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Stroke(s) => s.kind(),
            Shape::Annotation(s) => s.kind(),
        }
    }

    pub fn origin(&self) -> Point {
        match self {
            Shape::Stroke(s) => s.origin,
            Shape::Annotation(s) => s.origin,
        }
    }

    pub fn endpoint(&self) -> Point {
        match self {
            Shape::Stroke(s) => s.endpoint,
            Shape::Annotation(s) => s.endpoint,
        }
    }

    pub fn color(&self) -> &str {
        match self {
            Shape::Stroke(s) => &s.color,
            Shape::Annotation(s) => &s.color,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Shape::Stroke(s) => &s.text,
            Shape::Annotation(s) => &s.text,
        }
    }

    /// Relay-assigned receipt time in Unix milliseconds, if known.
    pub fn timestamp(&self) -> Option<i64> {
        match self {
            Shape::Stroke(s) => s.timestamp,
            Shape::Annotation(s) => s.timestamp,
        }
    }

    pub fn set_timestamp(&mut self, timestamp: Option<i64>) {
        match self {
            Shape::Stroke(s) => s.timestamp = timestamp,
            Shape::Annotation(s) => s.timestamp = timestamp,
        }
    }

    pub fn set_origin(&mut self, origin: Point) {
        match self {
            Shape::Stroke(s) => s.origin = origin,
            Shape::Annotation(s) => s.origin = origin,
        }
    }

    pub fn set_endpoint(&mut self, endpoint: Point) {
        match self {
            Shape::Stroke(s) => s.endpoint = endpoint,
            Shape::Annotation(s) => s.endpoint = endpoint,
        }
    }

    /// Place origin and endpoint relative to a pointer position.
    ///
    /// Offsets are `pointer - origin` and `pointer - endpoint` as recorded when
    /// the drag started.
    pub fn move_with_offsets(&mut self, pointer: Point, origin_offset: Vec2, endpoint_offset: Vec2) {
        self.set_origin(pointer - origin_offset);
        self.set_endpoint(pointer - endpoint_offset);
    }

    pub fn bounds(&self, canvas: Size) -> Rect {
        match self {
            Shape::Stroke(s) => s.bounds(canvas),
            Shape::Annotation(s) => s.bounds(canvas),
        }
    }

    pub fn contains(&self, point: Point, canvas: Size) -> bool {
        match self {
            Shape::Stroke(s) => s.contains(point, canvas),
            Shape::Annotation(s) => s.contains(point, canvas),
        }
    }

    pub fn draw(&self, renderer: &mut dyn Renderer, canvas: Size) {
        match self {
            Shape::Stroke(s) => s.draw(renderer, canvas),
            Shape::Annotation(s) => s.draw(renderer, canvas),
        }
    }

    pub fn is_stroke(&self) -> bool {
        matches!(self, Shape::Stroke(_))
    }

    pub fn is_annotation(&self) -> bool {
        matches!(self, Shape::Annotation(_))
    }
}
