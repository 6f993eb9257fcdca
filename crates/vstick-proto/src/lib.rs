//! Value types shared between the control core, the flight controller
//! adapters and the operator console.

pub mod event;
pub mod log;
pub mod mission;
pub mod stick;
pub mod telemetry;

pub use event::{EventCategory, FcEvent, MissionEvent};
pub use log::{DebugLogEntry, LogLevel};
pub use mission::{DistanceToTarget, MissionOutcome, MissionProgress, MissionState};
pub use stick::{AxisAssignment, ControlMode, StickAxes, StickSide};
pub use telemetry::{AltitudeInfo, FlightStatus, ReadinessCheck, ReadinessLevel};
