//! Rotation step — a validated, signed multiple of 90°.
//!
//! ±270 behaves like the opposite-sign quarter turn for geometry, but the
//! signed degree value is what gets added to angle fields.

use crate::error::RotationError;

/// Canonical geometric effect of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Clockwise,
    CounterClockwise,
    Half,
}

/// A validated rotation step in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationStep(i32);

impl RotationStep {
    pub const CLOCKWISE: Self = Self(90);
    pub const COUNTER_CLOCKWISE: Self = Self(-90);
    pub const HALF: Self = Self(180);

    /// Validate a signed step.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRotationStep` unless `degrees` is one of ±90, ±180, ±270.
    pub fn new(degrees: i32) -> Result<Self, RotationError> {
        match degrees {
            90 | -90 | 180 | -180 | 270 | -270 => Ok(Self(degrees)),
            other => Err(RotationError::InvalidRotationStep(other)),
        }
    }

    #[must_use]
    pub fn degrees(self) -> i32 {
        self.0
    }

    #[must_use]
    pub fn turn(self) -> Turn {
        match self.0 {
            90 | -270 => Turn::Clockwise,
            -90 | 270 => Turn::CounterClockwise,
            _ => Turn::Half,
        }
    }

    /// The step that undoes this one.
    #[must_use]
    pub fn inverse(self) -> Self {
        Self(-self.0)
    }

    /// Width and height exchange roles on quarter turns.
    #[must_use]
    pub fn swaps_axes(self) -> bool {
        self.0.abs() % 180 != 0
    }

    /// Add this step to an angle field, normalized into `[0, 360)`.
    #[must_use]
    pub fn add_to_angle(self, angle: f64) -> f64 {
        normalize_degrees(angle + f64::from(self.0))
    }

    /// Add this step to an integral cumulative angle, normalized into `[0, 360)`.
    #[must_use]
    pub fn add_to_cumulative(self, angle: i32) -> i32 {
        // Reduce first: `angle` may come from an arbitrary filename suffix.
        (angle.rem_euclid(360) + self.0).rem_euclid(360)
    }
}

impl TryFrom<i32> for RotationStep {
    type Error = RotationError;

    fn try_from(degrees: i32) -> Result<Self, Self::Error> {
        Self::new(degrees)
    }
}

impl std::fmt::Display for RotationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.0)
    }
}

/// Normalize an angle in degrees into `[0, 360)`.
#[must_use]
pub fn normalize_degrees(angle: f64) -> f64 {
    let normalized = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if normalized >= 360.0 { 0.0 } else { normalized }
}

#[cfg(test)]
#[path = "step_test.rs"]
mod tests;
