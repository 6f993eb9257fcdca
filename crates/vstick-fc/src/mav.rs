use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use mavlink::{
    common::{
        GpsFixType, MavAutopilot, MavCmd, MavLandedState, MavMessage, MavModeFlag, MavResult,
        MavState, MavType, COMMAND_LONG_DATA, HEARTBEAT_DATA, MANUAL_CONTROL_DATA, SYS_STATUS_DATA,
    },
    MavConnection, MavHeader,
};
use tokio::task::JoinHandle;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use vstick_proto::{
    AltitudeInfo, ControlMode, DistanceToTarget, EventCategory, FcEvent, FlightStatus, MissionEvent,
    MissionProgress, ReadinessCheck, StickAxes,
};

use crate::error::FcError;
use crate::safety::{CommandRateLimit, GuardedCommand};
use crate::service::{FlightController, MissionPlanner};
use crate::state::LinkStatus;
use crate::subscription::{EventBus, EventHandler, Subscription};

#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub dev: String,
    pub baud: u32,
    pub sys_id: u8,
    pub comp_id: u8,
    pub target_sys: u8,
    pub target_comp: u8,
    pub require_heartbeat: bool,
    pub heartbeat_timeout: Duration,
    pub send_heartbeat_hz: f32,
    pub takeoff_alt_m: f32,
    pub min_sats: u8,
    pub min_battery_pct: u8,
    pub command_min_interval: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct BatteryStatus {
    pub voltage: Option<f32>,      // Volts
    pub current: Option<f32>,      // Amps
    pub remaining: Option<u8>,     // Percent 0-100
}

#[derive(Debug, Clone, Copy, Default)]
struct MissionTrack {
    active: bool,
    total: u32,
    current: u32,
    last_dist_m: Option<f64>,
}

/// Telemetry folded from the FC message stream.
#[derive(Debug, Clone, Default)]
struct Telemetry {
    heartbeat_seen: bool,
    armed: bool,
    custom_mode: u32,
    in_air: Option<bool>,
    relative_alt_m: Option<f64>,
    gps_fix_3d: bool,
    sats: u8,
    battery: BatteryStatus,
    wp_dist_m: Option<f64>,
    mission: MissionTrack,
    pending_pause: Option<bool>,
    last_status: Option<FlightStatus>,
}

impl Telemetry {
    fn is_flying(&self) -> bool {
        self.in_air
            .unwrap_or_else(|| self.armed && self.relative_alt_m.map(|a| a > 0.5).unwrap_or(false))
    }

    fn flight_status(&self, connected: bool) -> FlightStatus {
        FlightStatus {
            is_connected: connected,
            are_motors_on: self.armed,
            is_flying: self.is_flying(),
            flight_mode: arducopter_mode_name(self.custom_mode).to_string(),
        }
    }

    fn readiness(&self, connected: bool, min_sats: u8, min_battery_pct: u8) -> ReadinessCheck {
        if !connected {
            return ReadinessCheck::not_ready("No heartbeat from flight controller");
        }
        if !self.gps_fix_3d || self.sats < min_sats {
            return ReadinessCheck::not_ready(format!(
                "Weak GPS signal ({} satellites, 3D fix: {})",
                self.sats, self.gps_fix_3d
            ));
        }
        if let Some(pct) = self.battery.remaining {
            if pct < min_battery_pct {
                return ReadinessCheck::not_ready(format!("Battery too low ({}%)", pct));
            }
        }
        ReadinessCheck::ready("Ready to fly")
    }

    fn progress(&self) -> MissionProgress {
        let m = &self.mission;
        let fraction = if m.total > 0 { m.current as f64 / m.total as f64 } else { 0.0 };
        let distance = match (self.gps_fix_3d, self.wp_dist_m) {
            (true, Some(d)) => DistanceToTarget::Meters(d),
            _ => DistanceToTarget::Unknown,
        };
        MissionProgress::new(m.current, m.total, fraction, distance)
    }

    fn update_battery(&mut self, status: &SYS_STATUS_DATA) {
        // voltage_battery is in millivolts
        if status.voltage_battery != u16::MAX {
            self.battery.voltage = Some(status.voltage_battery as f32 / 1000.0);
        }
        // current_battery is in centiamps, -1 means invalid
        if status.current_battery != -1 {
            self.battery.current = Some(status.current_battery as f32 / 100.0);
        }
        if status.battery_remaining >= 0 && status.battery_remaining <= 100 {
            self.battery.remaining = Some(status.battery_remaining as u8);
        }
    }

    /// Folds one message in and returns the events it produced.
    fn apply(&mut self, msg: &MavMessage) -> Vec<FcEvent> {
        let mut events = Vec::new();
        match msg {
            MavMessage::HEARTBEAT(hb) => {
                self.heartbeat_seen = true;
                let armed = hb.base_mode.contains(MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED);
                if self.mission.active && self.armed && !armed {
                    self.mission.active = false;
                    events.push(FcEvent::Mission(MissionEvent::Failed {
                        reason: "vehicle disarmed during mission".into(),
                    }));
                }
                self.armed = armed;
                self.custom_mode = hb.custom_mode;
            }
            MavMessage::EXTENDED_SYS_STATE(s) => {
                self.in_air = Some(matches!(
                    s.landed_state,
                    MavLandedState::MAV_LANDED_STATE_IN_AIR
                        | MavLandedState::MAV_LANDED_STATE_TAKEOFF
                        | MavLandedState::MAV_LANDED_STATE_LANDING
                ));
            }
            MavMessage::GLOBAL_POSITION_INT(p) => {
                // relative_alt is in millimeters
                self.relative_alt_m = Some(p.relative_alt as f64 / 1000.0);
            }
            MavMessage::GPS_RAW_INT(g) => {
                self.gps_fix_3d = matches!(
                    g.fix_type,
                    GpsFixType::GPS_FIX_TYPE_3D_FIX
                        | GpsFixType::GPS_FIX_TYPE_DGPS
                        | GpsFixType::GPS_FIX_TYPE_RTK_FLOAT
                        | GpsFixType::GPS_FIX_TYPE_RTK_FIXED
                        | GpsFixType::GPS_FIX_TYPE_STATIC
                        | GpsFixType::GPS_FIX_TYPE_PPP
                );
                self.sats = g.satellites_visible;
            }
            MavMessage::SYS_STATUS(s) => self.update_battery(s),
            MavMessage::NAV_CONTROLLER_OUTPUT(n) => {
                let d = n.wp_dist as f64;
                self.wp_dist_m = Some(d);
                let moved = self.mission.last_dist_m.map(|last| (last - d).abs() >= 1.0).unwrap_or(true);
                if self.mission.active && moved {
                    self.mission.last_dist_m = Some(d);
                    events.push(FcEvent::Mission(MissionEvent::Progress(self.progress())));
                }
            }
            MavMessage::MISSION_COUNT(c) => {
                self.mission.total = c.count as u32;
            }
            MavMessage::MISSION_CURRENT(c) => {
                let seq = c.seq as u32;
                if seq != self.mission.current {
                    self.mission.current = seq;
                    if self.mission.active {
                        events.push(FcEvent::Mission(MissionEvent::Progress(self.progress())));
                    }
                }
            }
            MavMessage::MISSION_ITEM_REACHED(r) => {
                let m = &mut self.mission;
                if m.active && m.total > 0 && r.seq as u32 + 1 >= m.total {
                    m.active = false;
                    m.current = m.total;
                    events.push(FcEvent::Mission(MissionEvent::Progress(self.progress())));
                    events.push(FcEvent::Mission(MissionEvent::Completed));
                }
            }
            MavMessage::COMMAND_ACK(ack) => {
                let accepted = matches!(ack.result, MavResult::MAV_RESULT_ACCEPTED);
                let reason = if accepted { None } else { Some(format!("{:?}", ack.result)) };
                match ack.command {
                    MavCmd::MAV_CMD_NAV_TAKEOFF => {
                        events.push(FcEvent::TakeoffResult { ok: accepted, reason });
                    }
                    MavCmd::MAV_CMD_NAV_LAND => {
                        events.push(FcEvent::LandingResult { ok: accepted, reason });
                    }
                    MavCmd::MAV_CMD_MISSION_START => {
                        if accepted {
                            events.push(FcEvent::Mission(MissionEvent::Started));
                        } else {
                            self.mission.active = false;
                            events.push(FcEvent::Mission(MissionEvent::Failed {
                                reason: reason.unwrap_or_default(),
                            }));
                        }
                    }
                    MavCmd::MAV_CMD_DO_PAUSE_CONTINUE => match (accepted, self.pending_pause.take()) {
                        (true, Some(true)) => events.push(FcEvent::Mission(MissionEvent::Paused)),
                        (true, Some(false)) => events.push(FcEvent::Mission(MissionEvent::Resumed)),
                        _ => {}
                    },
                    _ => {}
                }
            }
            _ => {}
        }
        events.extend(self.status_event(self.heartbeat_seen));
        events
    }

    fn on_link_lost(&mut self) -> Vec<FcEvent> {
        self.heartbeat_seen = false;
        self.status_event(false).into_iter().collect()
    }

    fn status_event(&mut self, connected: bool) -> Option<FcEvent> {
        let status = self.flight_status(connected);
        if self.last_status.as_ref() == Some(&status) {
            return None;
        }
        self.last_status = Some(status.clone());
        Some(FcEvent::FlightStatusChanged(status))
    }
}

fn arducopter_mode_name(custom_mode: u32) -> &'static str {
    match custom_mode {
        0 => "STABILIZE",
        1 => "ACRO",
        2 => "ALT_HOLD",
        3 => "AUTO",
        4 => "GUIDED",
        5 => "LOITER",
        6 => "RTL",
        9 => "LAND",
        16 => "POSHOLD",
        17 => "BRAKE",
        _ => "UNKNOWN",
    }
}

/// Scales normalized axes to MANUAL_CONTROL ranges: x/y/r in [-1000, 1000],
/// z (throttle) in [0, 1000] with 500 as hover.
fn manual_control_axes(axes: StickAxes) -> (i16, i16, i16, i16) {
    let scale = |v: f64| (v * 1000.0).round() as i16;
    let x = scale(axes.pitch);
    let y = scale(axes.roll);
    let z = ((axes.throttle + 1.0) * 500.0).round() as i16;
    let r = scale(axes.yaw);
    (x, y, z, r)
}

/// Serial MAVLink connection shared by the reader task and command callers.
struct Link {
    conn: Arc<dyn MavConnection<MavMessage> + Send + Sync>,
    cfg: LinkConfig,
    sequence: Mutex<u8>,
}

impl Link {
    fn send(&self, msg: MavMessage) -> Result<(), FcError> {
        let hdr = {
            let mut seq = self.sequence.lock().unwrap_or_else(|e| e.into_inner());
            *seq = seq.wrapping_add(1);
            MavHeader { system_id: self.cfg.sys_id, component_id: self.cfg.comp_id, sequence: *seq }
        };
        self.conn
            .send(&hdr, &msg)
            .map(|_| ())
            .map_err(|e| FcError::Transport(format!("mavlink send: {:?}", e)))
    }

    fn command_long(&self, command: MavCmd, params: [f32; 7]) -> Result<(), FcError> {
        let cmd = COMMAND_LONG_DATA {
            target_system: self.cfg.target_sys,
            target_component: self.cfg.target_comp,
            command,
            confirmation: 0,
            param1: params[0],
            param2: params[1],
            param3: params[2],
            param4: params[3],
            param5: params[4],
            param6: params[5],
            param7: params[6],
        };
        self.send(MavMessage::COMMAND_LONG(cmd))
    }

    fn send_heartbeat(&self) -> Result<(), FcError> {
        let hb = HEARTBEAT_DATA {
            custom_mode: 0,
            mavtype: MavType::MAV_TYPE_GCS,
            autopilot: MavAutopilot::MAV_AUTOPILOT_INVALID,
            base_mode: MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED,
            system_status: MavState::MAV_STATE_ACTIVE,
            mavlink_version: 3,
        };
        self.send(MavMessage::HEARTBEAT(hb))
    }

    fn send_manual_control(&self, axes: StickAxes) -> Result<(), FcError> {
        let (x, y, z, r) = manual_control_axes(axes);
        let mc = MANUAL_CONTROL_DATA {
            target: self.cfg.target_sys,
            x,
            y,
            z,
            r,
            buttons: 0,
            ..Default::default()
        };
        self.send(MavMessage::MANUAL_CONTROL(mc))
    }
}

#[derive(Debug, Default)]
struct StickLink {
    enabled: bool,
    mode: Option<ControlMode>,
}

/// Flight controller and mission planner backed by a serial MAVLink link
/// (ArduCopter conventions).
pub struct MavFlightController {
    link: Arc<Link>,
    telemetry: Arc<Mutex<Telemetry>>,
    status: Arc<Mutex<LinkStatus>>,
    bus: EventBus,
    stick: Mutex<StickLink>,
    limiter: Mutex<CommandRateLimit>,
    running: Arc<AtomicBool>,
}

impl MavFlightController {
    pub fn open(cfg: LinkConfig) -> Result<Self> {
        // quick validate device
        let _ = tokio_serial::new(&cfg.dev, cfg.baud)
            .open_native_async()
            .with_context(|| format!("open fc serial device {}", cfg.dev))?;

        let url = format!("serial:{}:{}", cfg.dev, cfg.baud);
        let conn = mavlink::connect::<MavMessage>(&url)
            .with_context(|| format!("mavlink connect {}", url))?;

        let status = LinkStatus {
            port: Some(cfg.dev.clone()),
            baud: Some(cfg.baud),
            ..LinkStatus::default()
        };
        let limiter = CommandRateLimit::new(cfg.command_min_interval);
        info!("fc: opened {} @ {}", cfg.dev, cfg.baud);

        Ok(Self {
            link: Arc::new(Link { conn: Arc::from(conn), cfg, sequence: Mutex::new(0) }),
            telemetry: Arc::new(Mutex::new(Telemetry::default())),
            status: Arc::new(Mutex::new(status)),
            bus: EventBus::new(),
            stick: Mutex::new(StickLink::default()),
            limiter: Mutex::new(limiter),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Starts the blocking reader loop (mavlink serial recv can block).
    pub fn spawn_reader(&self) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let link = self.link.clone();
        let telemetry = self.telemetry.clone();
        let status = self.status.clone();
        let bus = self.bus.clone();
        let running = self.running.clone();

        tokio::task::spawn_blocking(move || {
            let hb_interval = Duration::from_secs_f32(1.0 / link.cfg.send_heartbeat_hz);
            let mut last_hb_send: Option<Instant> = None;

            while running.load(Ordering::SeqCst) {
                if last_hb_send.map(|t| t.elapsed() >= hb_interval).unwrap_or(true) {
                    if let Err(e) = link.send_heartbeat() {
                        debug!("fc: companion heartbeat failed: {}", e);
                    }
                    last_hb_send = Some(Instant::now());
                }

                match link.conn.recv() {
                    Ok((hdr, msg)) => {
                        if hdr.system_id != link.cfg.target_sys {
                            continue;
                        }
                        {
                            let mut st = status.lock().unwrap_or_else(|e| e.into_inner());
                            st.messages_seen += 1;
                            if matches!(msg, MavMessage::HEARTBEAT(_)) {
                                st.connected = true;
                                st.last_heartbeat = Some(Instant::now());
                            }
                            st.last_msg = Some(format!("{:?}", msg));
                        }
                        let events = telemetry.lock().unwrap_or_else(|e| e.into_inner()).apply(&msg);
                        for ev in events {
                            bus.emit(ev);
                        }
                    }
                    Err(e) => {
                        status.lock().unwrap_or_else(|e| e.into_inner()).last_error = Some(format!("{:?}", e));
                        std::thread::sleep(Duration::from_millis(10));
                    }
                }

                let lost = {
                    let mut st = status.lock().unwrap_or_else(|e| e.into_inner());
                    if st.connected && !st.is_alive(link.cfg.heartbeat_timeout) {
                        st.connected = false;
                        true
                    } else {
                        false
                    }
                };
                if lost {
                    warn!("fc: heartbeat lost (timeout {:?})", link.cfg.heartbeat_timeout);
                    let events = telemetry.lock().unwrap_or_else(|e| e.into_inner()).on_link_lost();
                    for ev in events {
                        bus.emit(ev);
                    }
                }
            }
            info!("fc: reader stopped");
        })
    }

    /// Asks the reader loop to exit after its current receive.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn link_status(&self) -> LinkStatus {
        self.status.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn battery_status(&self) -> BatteryStatus {
        self.telemetry.lock().unwrap_or_else(|e| e.into_inner()).battery.clone()
    }

    fn connected(&self) -> bool {
        self.status
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_alive(self.link.cfg.heartbeat_timeout)
    }

    fn guard(&self, cmd: GuardedCommand) -> Result<(), FcError> {
        if self.link.cfg.require_heartbeat && !self.connected() {
            warn!("fc: refusing {}: no heartbeat", cmd.label());
            return Err(FcError::NotConnected);
        }
        if !self.limiter.lock().unwrap_or_else(|e| e.into_inner()).allow(cmd) {
            warn!("fc: {} rate-limited", cmd.label());
            return Err(FcError::RateLimited(cmd.label()));
        }
        Ok(())
    }

    fn set_stick_enabled(&self, enabled: bool) -> Result<(), FcError> {
        let changed = {
            let mut s = self.stick.lock().unwrap_or_else(|e| e.into_inner());
            if enabled && s.mode.is_none() {
                return Err(FcError::ControlModeUnset);
            }
            let changed = s.enabled != enabled;
            s.enabled = enabled;
            changed
        };
        if !enabled {
            // leave the sticks centred when handing back to the RC
            if let Err(e) = self.link.send_manual_control(StickAxes::ZERO) {
                warn!("fc: neutral stick on disable failed: {}", e);
            }
        }
        if changed {
            info!("fc: virtual stick {}", if enabled { "enabled" } else { "disabled" });
            self.bus.emit(FcEvent::VirtualStickChanged { enabled });
        }
        Ok(())
    }

    fn with_telemetry<T>(&self, f: impl FnOnce(&mut Telemetry) -> T) -> T {
        f(&mut self.telemetry.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl Drop for MavFlightController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[async_trait]
impl FlightController for MavFlightController {
    async fn is_ready_for_takeoff(&self) -> Result<ReadinessCheck, FcError> {
        let connected = self.connected();
        let cfg = &self.link.cfg;
        Ok(self.with_telemetry(|t| t.readiness(connected, cfg.min_sats, cfg.min_battery_pct)))
    }

    async fn request_takeoff(&self) -> Result<(), FcError> {
        self.guard(GuardedCommand::Takeoff)?;
        info!("FC: sending TAKEOFF to {} m", self.link.cfg.takeoff_alt_m);
        self.link.command_long(
            MavCmd::MAV_CMD_NAV_TAKEOFF,
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, self.link.cfg.takeoff_alt_m],
        )
    }

    async fn request_landing(&self) -> Result<(), FcError> {
        self.guard(GuardedCommand::Land)?;
        info!("FC: sending LAND");
        self.link.command_long(MavCmd::MAV_CMD_NAV_LAND, [0.0; 7])
    }

    async fn cancel_landing(&self) -> Result<(), FcError> {
        self.guard(GuardedCommand::Hold)?;
        info!("FC: cancelling landing (HOLD/LOITER)");
        self.link.command_long(MavCmd::MAV_CMD_NAV_LOITER_UNLIM, [0.0; 7])
    }

    async fn set_virtual_stick_enabled(&self, enabled: bool) -> Result<(), FcError> {
        self.set_stick_enabled(enabled)
    }

    async fn set_virtual_stick_control_mode(&self, mode: ControlMode) -> Result<(), FcError> {
        debug!("fc: virtual stick control mode {:?}", mode);
        self.stick.lock().unwrap_or_else(|e| e.into_inner()).mode = Some(mode);
        Ok(())
    }

    async fn send_stick_command(&self, axes: StickAxes) -> Result<(), FcError> {
        if !self.stick.lock().unwrap_or_else(|e| e.into_inner()).enabled && !axes.is_zero() {
            return Err(FcError::VirtualStickDisabled);
        }
        self.link.send_manual_control(axes)
    }

    async fn flight_status(&self) -> Result<FlightStatus, FcError> {
        let connected = self.connected();
        Ok(self.with_telemetry(|t| t.flight_status(connected)))
    }

    async fn altitude(&self) -> Result<AltitudeInfo, FcError> {
        if !self.connected() {
            return Err(FcError::NotConnected);
        }
        self.with_telemetry(|t| t.relative_alt_m)
            .map(|altitude| AltitudeInfo { altitude })
            .ok_or_else(|| FcError::rejected("altitude", "no position telemetry received yet"))
    }

    fn subscribe(&self, category: EventCategory, handler: EventHandler) -> Result<Subscription, FcError> {
        Ok(self.bus.subscribe(category, handler))
    }
}

#[async_trait]
impl MissionPlanner for MavFlightController {
    async fn start_mission(&self, handle: &str) -> Result<(), FcError> {
        if self.stick.lock().unwrap_or_else(|e| e.into_inner()).mode.is_none() {
            return Err(FcError::ControlModeUnset);
        }
        self.guard(GuardedCommand::MissionStart)?;
        info!("FC: starting mission '{}'", handle);
        self.link.command_long(MavCmd::MAV_CMD_MISSION_START, [0.0; 7])?;
        self.with_telemetry(|t| {
            t.mission.active = true;
            t.mission.current = 0;
            t.mission.last_dist_m = None;
        });
        self.set_stick_enabled(true)
    }

    async fn pause_mission(&self) -> Result<(), FcError> {
        self.guard(GuardedCommand::Pause)?;
        info!("FC: pausing mission");
        self.with_telemetry(|t| t.pending_pause = Some(true));
        self.link.command_long(MavCmd::MAV_CMD_DO_PAUSE_CONTINUE, [0.0; 7])
    }

    async fn resume_mission(&self) -> Result<(), FcError> {
        self.guard(GuardedCommand::Resume)?;
        info!("FC: resuming mission");
        self.with_telemetry(|t| t.pending_pause = Some(false));
        self.link
            .command_long(MavCmd::MAV_CMD_DO_PAUSE_CONTINUE, [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])
    }

    async fn stop_mission(&self) -> Result<(), FcError> {
        self.guard(GuardedCommand::Hold)?;
        info!("FC: stopping mission (HOLD/LOITER)");
        self.link.command_long(MavCmd::MAV_CMD_NAV_LOITER_UNLIM, [0.0; 7])?;
        self.with_telemetry(|t| t.mission.active = false);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mavlink::common::{
        COMMAND_ACK_DATA, GPS_RAW_INT_DATA, MISSION_COUNT_DATA, MISSION_CURRENT_DATA,
        MISSION_ITEM_REACHED_DATA,
    };

    fn heartbeat(armed: bool, custom_mode: u32) -> MavMessage {
        let mut base_mode = MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED;
        if armed {
            base_mode |= MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED;
        }
        MavMessage::HEARTBEAT(HEARTBEAT_DATA {
            custom_mode,
            mavtype: MavType::MAV_TYPE_QUADROTOR,
            autopilot: MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA,
            base_mode,
            system_status: MavState::MAV_STATE_ACTIVE,
            mavlink_version: 3,
        })
    }

    #[test]
    fn manual_control_scaling() {
        assert_eq!(manual_control_axes(StickAxes::ZERO), (0, 0, 500, 0));
        let full = StickAxes::new(-1.0, 1.0, 0.5, 1.0);
        assert_eq!(manual_control_axes(full), (1000, 500, 1000, -1000));
    }

    #[test]
    fn heartbeat_reports_status_change_once() {
        let mut t = Telemetry::default();
        let ev = t.apply(&heartbeat(false, 5));
        assert_eq!(
            ev,
            vec![FcEvent::FlightStatusChanged(FlightStatus {
                is_connected: true,
                are_motors_on: false,
                is_flying: false,
                flight_mode: "LOITER".into(),
            })]
        );
        assert!(t.apply(&heartbeat(false, 5)).is_empty());
    }

    #[test]
    fn readiness_flags_weak_gps() {
        let mut t = Telemetry::default();
        t.apply(&heartbeat(false, 0));
        let r = t.readiness(true, 6, 20);
        assert!(!r.ready);
        assert!(r.reason.contains("GPS"));

        t.apply(&MavMessage::GPS_RAW_INT(GPS_RAW_INT_DATA {
            fix_type: GpsFixType::GPS_FIX_TYPE_3D_FIX,
            satellites_visible: 12,
            ..Default::default()
        }));
        assert!(t.readiness(true, 6, 20).ready);
        assert!(!t.readiness(false, 6, 20).ready);
    }

    #[test]
    fn mission_completion_and_disarm_failure() {
        let mut t = Telemetry::default();
        t.apply(&MavMessage::MISSION_COUNT(MISSION_COUNT_DATA { count: 3, ..Default::default() }));
        t.mission.active = true;

        let ev = t.apply(&MavMessage::MISSION_CURRENT(MISSION_CURRENT_DATA { seq: 1, ..Default::default() }));
        match ev.first() {
            Some(FcEvent::Mission(MissionEvent::Progress(p))) => {
                assert_eq!(p.current_waypoint, 1);
                assert_eq!(p.total_waypoints, 3);
                // no GPS fix yet
                assert_eq!(p.distance_to_target, DistanceToTarget::Unknown);
            }
            other => panic!("unexpected {:?}", other),
        }

        let ev = t.apply(&MavMessage::MISSION_ITEM_REACHED(MISSION_ITEM_REACHED_DATA { seq: 2, ..Default::default() }));
        assert!(ev.contains(&FcEvent::Mission(MissionEvent::Completed)));
        assert!(!t.mission.active);

        t.mission.active = true;
        t.apply(&heartbeat(true, 3));
        let ev = t.apply(&heartbeat(false, 3));
        assert!(ev.iter().any(|e| matches!(e, FcEvent::Mission(MissionEvent::Failed { .. }))));
    }

    #[test]
    fn takeoff_ack_becomes_result_event() {
        let mut t = Telemetry::default();
        let ev = t.apply(&MavMessage::COMMAND_ACK(COMMAND_ACK_DATA {
            command: MavCmd::MAV_CMD_NAV_TAKEOFF,
            result: MavResult::MAV_RESULT_DENIED,
            ..Default::default()
        }));
        assert!(matches!(ev.first(), Some(FcEvent::TakeoffResult { ok: false, reason: Some(_) })));
    }
}
