//! Coordinate transforms for quarter-turn scene rotation.
//!
//! Points are expressed in canvas pixels with the origin at the top-left and
//! y pointing down. `old_width`/`old_height` are the canvas extent before the
//! rotation is applied.

use crate::step::{RotationStep, Turn};

/// A canvas point in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Map a point on the old canvas to its position on the rotated canvas.
#[must_use]
pub fn transform(point: Point, old_width: f64, old_height: f64, step: RotationStep) -> Point {
    let Point { x, y } = point;
    match step.turn() {
        Turn::Clockwise => Point::new(old_height - y, x),
        Turn::CounterClockwise => Point::new(y, old_width - x),
        Turn::Half => Point::new(old_width - x, old_height - y),
    }
}

/// Rotate a vector about the origin. Used for offsets that are not anchored
/// to the canvas bounds.
#[must_use]
pub fn rotate_vector(vector: Point, step: RotationStep) -> Point {
    let Point { x, y } = vector;
    match step.turn() {
        Turn::Clockwise => Point::new(-y, x),
        Turn::CounterClockwise => Point::new(y, -x),
        Turn::Half => Point::new(-x, -y),
    }
}

/// Canvas extent after the step.
#[must_use]
pub fn rotated_extent(width: f64, height: f64, step: RotationStep) -> (f64, f64) {
    if step.swaps_axes() { (height, width) } else { (width, height) }
}

#[cfg(test)]
#[path = "transform_test.rs"]
mod tests;
