//! Viewport module for device ↔ fractional coordinate transforms.

use kurbo::{Point, Size};
use serde::{Deserialize, Serialize};

/// Smallest allowed canvas dimension, in device pixels.
pub const MIN_DIMENSION: f64 = 1.0;

/// Convert a device-pixel point into a fraction of `size`.
pub fn to_fraction(device: Point, size: Size) -> Point {
    Point::new(device.x / size.width, device.y / size.height)
}

/// Convert a fractional point back into device pixels for `size`.
pub fn to_device(fraction: Point, size: Size) -> Point {
    Point::new(fraction.x * size.width, fraction.y * size.height)
}

/// Viewport tracks the current canvas dimensions of one client.
///
/// Every outbound event is normalized against the viewport at send time and
/// every inbound event is denormalized against it at receive time, so boards
/// of different physical sizes stay proportionally aligned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    size: Size,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(800.0, 600.0)
    }
}

impl Viewport {
    /// Create a viewport, clamping each dimension to at least one pixel.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            size: Size::new(width.max(MIN_DIMENSION), height.max(MIN_DIMENSION)),
        }
    }

    /// Current canvas size in device pixels.
    pub fn size(&self) -> Size {
        self.size
    }

    pub fn width(&self) -> f64 {
        self.size.width
    }

    pub fn height(&self) -> f64 {
        self.size.height
    }

    /// Resize the canvas (e.g. after the window changed).
    pub fn resize(&mut self, width: f64, height: f64) {
        *self = Self::new(width, height);
    }

    /// Convert a device point to fractional coordinates.
    pub fn to_fraction(&self, device: Point) -> Point {
        to_fraction(device, self.size)
    }

    /// Convert a fractional point to device coordinates.
    pub fn to_device(&self, fraction: Point) -> Point {
        to_device(fraction, self.size)
    }
}
