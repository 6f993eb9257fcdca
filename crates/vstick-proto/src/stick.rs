use serde::{Deserialize, Serialize};

/// One virtual-stick command: four logical channels, each in [-1.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StickAxes {
    pub yaw: f64,
    pub throttle: f64,
    pub roll: f64,
    pub pitch: f64,
}

impl StickAxes {
    pub const ZERO: StickAxes = StickAxes { yaw: 0.0, throttle: 0.0, roll: 0.0, pitch: 0.0 };

    /// Builds axes with every channel clamped into [-1, 1]. NaN collapses to 0.
    pub fn new(yaw: f64, throttle: f64, roll: f64, pitch: f64) -> Self {
        Self {
            yaw: clamp_unit(yaw),
            throttle: clamp_unit(throttle),
            roll: clamp_unit(roll),
            pitch: clamp_unit(pitch),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.yaw == 0.0 && self.throttle == 0.0 && self.roll == 0.0 && self.pitch == 0.0
    }

    /// Returns a copy with the channel pair owned by `assignment` replaced.
    /// `x` is the horizontal stick deflection, `y` the vertical one.
    pub fn with_pair(self, assignment: AxisAssignment, x: f64, y: f64) -> Self {
        match assignment {
            AxisAssignment::YawThrottle => Self::new(x, y, self.roll, self.pitch),
            AxisAssignment::RollPitch => Self::new(self.yaw, self.throttle, x, y),
        }
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(-1.0, 1.0) }
}

/// Which logical channel pair a physical stick drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisAssignment {
    YawThrottle,
    RollPitch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StickSide {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollPitchMode {
    Angle,
    Velocity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YawMode {
    Angle,
    AngularVelocity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalMode {
    Velocity,
    Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSystem {
    Body,
    Ground,
}

/// How the flight controller interprets virtual-stick channels.
/// Must be pushed to the controller before virtual-stick is first enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMode {
    pub roll_pitch: RollPitchMode,
    pub yaw: YawMode,
    pub vertical: VerticalMode,
    pub coordinate: CoordinateSystem,
}

impl Default for ControlMode {
    fn default() -> Self {
        Self {
            roll_pitch: RollPitchMode::Velocity,
            yaw: YawMode::AngularVelocity,
            vertical: VerticalMode::Velocity,
            coordinate: CoordinateSystem::Body,
        }
    }
}
