use async_trait::async_trait;

use vstick_proto::{AltitudeInfo, ControlMode, EventCategory, FlightStatus, ReadinessCheck, StickAxes};

use crate::error::FcError;
use crate::subscription::{EventHandler, Subscription};

/// Contract of the aircraft-side flight controller.
///
/// Every call may fail; the control core treats failures as recoverable and
/// never assumes a rejected command took effect.
#[async_trait]
pub trait FlightController: Send + Sync {
    async fn is_ready_for_takeoff(&self) -> Result<ReadinessCheck, FcError>;

    async fn request_takeoff(&self) -> Result<(), FcError>;

    async fn request_landing(&self) -> Result<(), FcError>;

    async fn cancel_landing(&self) -> Result<(), FcError>;

    async fn set_virtual_stick_enabled(&self, enabled: bool) -> Result<(), FcError>;

    /// Must succeed once before virtual stick is first enabled.
    async fn set_virtual_stick_control_mode(&self, mode: ControlMode) -> Result<(), FcError>;

    async fn send_stick_command(&self, axes: StickAxes) -> Result<(), FcError>;

    async fn flight_status(&self) -> Result<FlightStatus, FcError>;

    async fn altitude(&self) -> Result<AltitudeInfo, FcError>;

    fn subscribe(&self, category: EventCategory, handler: EventHandler) -> Result<Subscription, FcError>;
}

/// Contract of the waypoint mission engine. Missions are addressed by name.
#[async_trait]
pub trait MissionPlanner: Send + Sync {
    async fn start_mission(&self, handle: &str) -> Result<(), FcError>;

    async fn pause_mission(&self) -> Result<(), FcError>;

    async fn resume_mission(&self) -> Result<(), FcError>;

    async fn stop_mission(&self) -> Result<(), FcError>;
}
