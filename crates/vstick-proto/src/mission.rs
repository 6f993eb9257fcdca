use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MissionState {
    #[default]
    Idle,
    Running,
    Paused,
    Stopped,
}

/// Distance to the next waypoint. `Unknown` means the aircraft is holding
/// position until it gets a valid GPS fix; it is never the same as zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DistanceToTarget {
    Unknown,
    Meters(f64),
}

impl DistanceToTarget {
    /// Value used by controllers that report a plain number.
    pub const UNKNOWN_SENTINEL: f64 = -1.0;

    pub fn from_raw(raw: f64) -> Self {
        if raw < 0.0 || raw.is_nan() {
            DistanceToTarget::Unknown
        } else {
            DistanceToTarget::Meters(raw)
        }
    }

    pub fn to_raw(self) -> f64 {
        match self {
            DistanceToTarget::Unknown => Self::UNKNOWN_SENTINEL,
            DistanceToTarget::Meters(m) => m,
        }
    }

    pub fn is_awaiting_gps(&self) -> bool {
        matches!(self, DistanceToTarget::Unknown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MissionProgress {
    pub current_waypoint: u32,
    pub total_waypoints: u32,
    /// Fraction complete, in [0, 1].
    pub progress: f64,
    pub distance_to_target: DistanceToTarget,
}

impl MissionProgress {
    pub fn new(current_waypoint: u32, total_waypoints: u32, progress: f64, distance_to_target: DistanceToTarget) -> Self {
        let progress = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
        Self { current_waypoint, total_waypoints, progress, distance_to_target }
    }

    /// Operator-facing one-liner.
    pub fn describe(&self) -> String {
        let pct = (self.progress * 100.0).round() as u32;
        match self.distance_to_target {
            DistanceToTarget::Unknown => format!(
                "waypoint {}/{} ({}%) holding position, waiting for GPS lock",
                self.current_waypoint, self.total_waypoints, pct
            ),
            DistanceToTarget::Meters(m) => format!(
                "waypoint {}/{} ({}%) {:.1} m to target",
                self.current_waypoint, self.total_waypoints, pct, m
            ),
        }
    }
}

/// Terminal result of a mission, broadcast to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissionOutcome {
    Completed,
    Failed { reason: String },
}
