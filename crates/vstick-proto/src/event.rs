use serde::{Deserialize, Serialize};

use crate::mission::MissionProgress;
use crate::telemetry::FlightStatus;

/// Upstream notification groups; one subscription is held per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    Takeoff,
    Landing,
    FlightStatus,
    VirtualStick,
    Mission,
}

impl EventCategory {
    pub const ALL: [EventCategory; 5] = [
        EventCategory::Takeoff,
        EventCategory::Landing,
        EventCategory::FlightStatus,
        EventCategory::VirtualStick,
        EventCategory::Mission,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MissionEvent {
    Started,
    Progress(MissionProgress),
    Completed,
    Failed { reason: String },
    Paused,
    Resumed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FcEvent {
    TakeoffResult { ok: bool, reason: Option<String> },
    LandingResult { ok: bool, reason: Option<String> },
    FlightStatusChanged(FlightStatus),
    VirtualStickChanged { enabled: bool },
    Mission(MissionEvent),
}

impl FcEvent {
    pub fn category(&self) -> EventCategory {
        match self {
            FcEvent::TakeoffResult { .. } => EventCategory::Takeoff,
            FcEvent::LandingResult { .. } => EventCategory::Landing,
            FcEvent::FlightStatusChanged(_) => EventCategory::FlightStatus,
            FcEvent::VirtualStickChanged { .. } => EventCategory::VirtualStick,
            FcEvent::Mission(_) => EventCategory::Mission,
        }
    }
}
