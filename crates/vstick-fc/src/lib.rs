pub mod autodetect;
pub mod error;
pub mod mav;
pub mod safety;
pub mod service;
pub mod state;
pub mod subscription;

pub use error::FcError;
pub use service::{FlightController, MissionPlanner};
pub use subscription::{EventBus, EventHandler, Subscription};

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct FcConfig {
    pub enable: bool,

    /// If true, scan candidate serial ports/bauds and pick the first
    /// that yields a MAVLink HEARTBEAT.
    pub autodetect: bool,

    /// When autodetect=false: fixed port config
    pub serial_dev: Option<String>,
    pub baud: Option<u32>,

    /// Autodetect candidates (paths), e.g. ["/dev/ttyACM0","/dev/ttyUSB0"]
    pub candidate_devs: Option<Vec<String>>,

    /// Autodetect candidate baud rates.
    pub candidate_bauds: Option<Vec<u32>>,

    /// Heartbeat wait per port attempt; also the link-loss timeout.
    pub heartbeat_timeout_ms: Option<u64>,

    /// MAVLink ids we use (ground side)
    pub sys_id: u8,
    pub comp_id: u8,

    /// target system/component (FC side). 1/1 is common for ArduPilot.
    pub target_sys: u8,
    pub target_comp: u8,

    /// Require seeing FC heartbeat before sending high-level commands
    pub require_heartbeat: bool,

    /// Companion heartbeat rate. Default 1 Hz.
    pub send_heartbeat_hz: Option<f32>,

    /// Takeoff target altitude above home. Default 1.2 m.
    pub takeoff_alt_m: Option<f32>,

    /// Readiness thresholds
    pub min_sats: Option<u8>,
    pub min_battery_pct: Option<u8>,

    /// Minimum spacing between repeated high-level commands. Default 2000 ms.
    pub command_min_interval_ms: Option<u64>,
}

impl FcConfig {
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms.unwrap_or(1500))
    }

    pub fn link_config(&self, dev: String, baud: u32) -> mav::LinkConfig {
        mav::LinkConfig {
            dev,
            baud,
            sys_id: self.sys_id,
            comp_id: self.comp_id,
            target_sys: self.target_sys,
            target_comp: self.target_comp,
            require_heartbeat: self.require_heartbeat,
            heartbeat_timeout: self.heartbeat_timeout().max(Duration::from_secs(3)),
            send_heartbeat_hz: self.send_heartbeat_hz.unwrap_or(1.0).max(0.2),
            takeoff_alt_m: self.takeoff_alt_m.unwrap_or(1.2),
            min_sats: self.min_sats.unwrap_or(6),
            min_battery_pct: self.min_battery_pct.unwrap_or(20),
            command_min_interval: Duration::from_millis(self.command_min_interval_ms.unwrap_or(2000)),
        }
    }
}
