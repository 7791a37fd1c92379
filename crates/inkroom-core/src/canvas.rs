//! Canvas state: the ordered shape sequence one client knows about.

use crate::render::{Renderer, SELECTION_COLOR, SELECTION_WIDTH};
use crate::shapes::Shape;
use crate::viewport::Viewport;
use kurbo::Point;

/// Everything a single client holds about the shared board.
///
/// Insertion order is arrival order: it is the draw order (back to front) and
/// the hit-test priority (last added wins).
#[derive(Debug, Clone, Default)]
pub struct CanvasState {
    /// All known shapes, device pixels, back to front.
    shapes: Vec<Shape>,
    /// Index of the selected shape, if any.
    selection: Option<usize>,
    /// Current canvas dimensions.
    viewport: Viewport,
    /// Set when the painted picture no longer matches `shapes`.
    dirty: bool,
}

impl CanvasState {
    /// Create an empty canvas of the given size.
    pub fn new(viewport: Viewport) -> Self {
        Self {
            shapes: Vec::new(),
            selection: None,
            viewport,
            dirty: true,
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Resize the canvas. Stored shapes keep their device coordinates.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.viewport.resize(width, height);
        self.dirty = true;
    }

    /// Shapes in draw order.
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Append a shape on top and return its index.
    pub fn push(&mut self, shape: Shape) -> usize {
        self.shapes.push(shape);
        self.dirty = true;
        self.shapes.len() - 1
    }

    /// Replace the whole sequence (snapshot sync). Clears the selection.
    pub fn replace_all(&mut self, shapes: Vec<Shape>) {
        self.shapes = shapes;
        self.selection = None;
        self.dirty = true;
    }

    /// Topmost shape containing `point`, searching last-added first.
    pub fn shape_at(&self, point: Point) -> Option<usize> {
        let size = self.viewport.size();
        self.shapes
            .iter()
            .rposition(|shape| shape.contains(point, size))
    }

    /// Select the shape at `index`. Out-of-range indices are ignored.
    pub fn select(&mut self, index: usize) {
        if index < self.shapes.len() {
            self.selection = Some(index);
            self.dirty = true;
        }
    }

    /// Clear the selection. Returns true if something was selected.
    pub fn clear_selection(&mut self) -> bool {
        let had_selection = self.selection.take().is_some();
        if had_selection {
            self.dirty = true;
        }
        had_selection
    }

    pub fn selection(&self) -> Option<usize> {
        self.selection
    }

    pub fn selected(&self) -> Option<&Shape> {
        self.selection.and_then(|i| self.shapes.get(i))
    }

    pub fn selected_mut(&mut self) -> Option<&mut Shape> {
        self.selection.and_then(|i| self.shapes.get_mut(i))
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Repaint everything if the canvas is dirty. Returns true if it painted.
    ///
    /// Shapes whose origin lies beyond the right or bottom edge are skipped.
    /// The selection outline follows the shape's own bounds, so a selected
    /// annotation is outlined by its canvas-scaled box, not a fixed 10 px square.
    pub fn redraw(&mut self, renderer: &mut dyn Renderer) -> bool {
        if !self.dirty {
            return false;
        }
        let size = self.viewport.size();
        renderer.clear(size);

        for shape in &self.shapes {
            let origin = shape.origin();
            if origin.x > size.width || origin.y > size.height {
                continue;
            }
            shape.draw(renderer, size);
        }

        if let Some(selected) = self.selected() {
            renderer.stroke_rect(selected.bounds(size), SELECTION_COLOR, SELECTION_WIDTH);
        }

        self.dirty = false;
        true
    }
}
