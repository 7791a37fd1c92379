//! Renderer trait abstraction.
//!
//! The core never rasterizes anything itself. Shapes and the canvas describe
//! what to paint through [`Renderer`], always in device pixels; a host (a web
//! canvas, a native window, a test) supplies the implementation.

use kurbo::{Point, Rect, Size};

/// Line width used for strokes and annotation boxes.
pub const STROKE_WIDTH: f64 = 2.0;
/// Outline color for the selected shape.
pub const SELECTION_COLOR: &str = "#CC0000";
/// Outline width for the selected shape.
pub const SELECTION_WIDTH: f64 = 2.0;

/// Drawing primitives a host must provide.
pub trait Renderer {
    /// Clear the whole canvas.
    fn clear(&mut self, size: Size);

    /// Draw a straight line between two device points.
    fn draw_line(&mut self, from: Point, to: Point, color: &str, width: f64);

    /// Stroke (not fill) a rectangle given in device pixels.
    fn stroke_rect(&mut self, rect: Rect, color: &str, width: f64);
}

/// A single recorded drawing call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear(Size),
    Line {
        from: Point,
        to: Point,
        color: String,
        width: f64,
    },
    Rect {
        rect: Rect,
        color: String,
        width: f64,
    },
}

/// Renderer that records every call, for headless clients and tests.
#[derive(Debug, Clone, Default)]
pub struct DisplayList {
    pub commands: Vec<DrawCommand>,
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of line commands recorded.
    pub fn line_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Line { .. }))
            .count()
    }

    /// Number of rectangle commands recorded.
    pub fn rect_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Rect { .. }))
            .count()
    }
}

impl Renderer for DisplayList {
    fn clear(&mut self, size: Size) {
        self.commands.push(DrawCommand::Clear(size));
    }

    fn draw_line(&mut self, from: Point, to: Point, color: &str, width: f64) {
        self.commands.push(DrawCommand::Line {
            from,
            to,
            color: color.to_string(),
            width,
        });
    }

    fn stroke_rect(&mut self, rect: Rect, color: &str, width: f64) {
        self.commands.push(DrawCommand::Rect {
            rect,
            color: color.to_string(),
            width,
        });
    }
}
