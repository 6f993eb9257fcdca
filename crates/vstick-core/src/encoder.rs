//! Gesture-to-stick encoding.
//!
//! A gesture is the knob's displacement from the pad centre in screen units
//! (y grows downward). It is clamped to the travel circle, normalized by the
//! travel radius and written into the channel pair the pad drives.

use std::sync::Mutex;

use vstick_proto::{AxisAssignment, StickAxes, StickSide};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureVector {
    pub dx: f64,
    pub dy: f64,
    pub max_radius: f64,
}

/// Normalizes a gesture to `(x, y)` in the unit disc. Upward is positive y.
pub fn normalize(g: GestureVector) -> (f64, f64) {
    let (mut dx, mut dy) = (g.dx, g.dy);
    let distance = (dx * dx + dy * dy).sqrt();
    if distance > g.max_radius {
        let ratio = g.max_radius / distance;
        dx *= ratio;
        dy *= ratio;
    }
    let x = (dx / g.max_radius).clamp(-1.0, 1.0);
    let y = (-dy / g.max_radius).clamp(-1.0, 1.0);
    (x, y)
}

/// One on-screen stick pad.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputSurface {
    assignment: AxisAssignment,
    max_radius: f64,
}

impl InputSurface {
    /// The knob can travel `travel_radius - knob_radius` from centre.
    pub fn new(assignment: AxisAssignment, travel_radius: f64, knob_radius: f64) -> Result<Self, ConfigError> {
        let max_radius = travel_radius - knob_radius;
        if !max_radius.is_finite() || max_radius <= 0.0 {
            return Err(ConfigError::InvalidRadius(max_radius));
        }
        Ok(Self { assignment, max_radius })
    }

    pub fn assignment(&self) -> AxisAssignment {
        self.assignment
    }

    pub fn max_radius(&self) -> f64 {
        self.max_radius
    }

    pub fn gesture(&self, dx: f64, dy: f64) -> GestureVector {
        GestureVector { dx, dy, max_radius: self.max_radius }
    }
}

/// Merges the two independent pads into one command.
#[derive(Debug)]
pub struct StickMixer {
    left: InputSurface,
    right: InputSurface,
    current: Mutex<StickAxes>,
}

impl StickMixer {
    pub fn new(left: InputSurface, right: InputSurface) -> Self {
        Self { left, right, current: Mutex::new(StickAxes::ZERO) }
    }

    pub fn surface(&self, side: StickSide) -> &InputSurface {
        match side {
            StickSide::Left => &self.left,
            StickSide::Right => &self.right,
        }
    }

    /// Applies a gesture from `side`, keeping the other pad's last values.
    pub fn apply(&self, side: StickSide, dx: f64, dy: f64) -> StickAxes {
        let surface = self.surface(side);
        let (x, y) = normalize(surface.gesture(dx, dy));
        let mut cur = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *cur = cur.with_pair(surface.assignment(), x, y);
        *cur
    }

    /// Centres both pads; release always stops every channel.
    pub fn reset(&self) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = StickAxes::ZERO;
    }

    pub fn current(&self) -> StickAxes {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}
