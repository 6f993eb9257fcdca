use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use vstick_fc::{FcError, FlightController, MissionPlanner};
use vstick_proto::{
    AltitudeInfo, AxisAssignment, ControlMode, FlightStatus, MissionOutcome, MissionProgress, MissionState,
    StickAxes, StickSide,
};

use crate::debuglog::{DebugLog, DEFAULT_LOG_CAPACITY};
use crate::dispatch::{DispatchLimiter, DEFAULT_MIN_INTERVAL};
use crate::encoder::{InputSurface, StickMixer};
use crate::error::{ConfigError, MissionError, SessionError};
use crate::mission::{ControlState, MissionController};
use crate::poller::{PollConfig, Poller, Readiness};
use crate::relay::EventRelay;

#[derive(Debug, Clone, Deserialize)]
pub struct StickConfig {
    pub travel_radius: f64,
    pub knob_radius: f64,
    pub left: AxisAssignment,
    pub right: AxisAssignment,
}

impl Default for StickConfig {
    fn default() -> Self {
        // mode 2 layout
        Self {
            travel_radius: 80.0,
            knob_radius: 20.0,
            left: AxisAssignment::YawThrottle,
            right: AxisAssignment::RollPitch,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    pub min_interval_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { min_interval_ms: DEFAULT_MIN_INTERVAL.as_millis() as u64 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    pub capacity: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { capacity: DEFAULT_LOG_CAPACITY }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub sticks: StickConfig,
    pub dispatch: DispatchConfig,
    pub poll: PollConfig,
    pub log: LogConfig,
    pub control_mode: ControlMode,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        InputSurface::new(self.sticks.left, self.sticks.travel_radius, self.sticks.knob_radius)?;
        if self.log.capacity == 0 {
            return Err(ConfigError::ZeroLogCapacity);
        }
        if self.dispatch.min_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("dispatch"));
        }
        if self.poll.readiness_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("readiness poll"));
        }
        if self.poll.altitude_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("altitude poll"));
        }
        Ok(())
    }
}

/// One aircraft control session: sticks, poller, mission controller and
/// event relay wired together. Dropping it tears everything down.
pub struct FlightSession<F: ?Sized, P: ?Sized> {
    fc: Arc<F>,
    log: DebugLog,
    mixer: StickMixer,
    controller: Arc<MissionController<F, P>>,
    dispatch: Arc<DispatchLimiter<F>>,
    poller: Arc<Poller<F>>,
    relay: EventRelay,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl<F, P> FlightSession<F, P>
where
    F: FlightController + ?Sized + 'static,
    P: MissionPlanner + ?Sized + 'static,
{
    pub async fn start(fc: Arc<F>, planner: Arc<P>, cfg: &SessionConfig) -> Result<Self, SessionError> {
        cfg.validate()?;
        let log = DebugLog::new(cfg.log.capacity);
        let sticks = &cfg.sticks;
        let left = InputSurface::new(sticks.left, sticks.travel_radius, sticks.knob_radius)?;
        let right = InputSurface::new(sticks.right, sticks.travel_radius, sticks.knob_radius)?;

        let controller = Arc::new(MissionController::new(fc.clone(), planner, log.clone()));
        controller
            .configure_control_mode(cfg.control_mode)
            .await
            .map_err(|source| SessionError::Setup { stage: "virtual stick control mode", source })?;

        // Nothing after this point can fail; if it did, dropping the relay
        // would revoke what it holds.
        let relay = EventRelay::start(fc.clone(), controller.clone(), log.clone()).await?;

        let dispatch = DispatchLimiter::new(
            fc.clone(),
            controller.virtual_stick_gate(),
            Duration::from_millis(cfg.dispatch.min_interval_ms),
            log.clone(),
        );
        let poller = Poller::new(fc.clone(), cfg.poll.clone(), log.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let tasks = vec![dispatch.spawn(), poller.spawn(relay.subscribe_flight_status(), shutdown_rx)];

        log.info("Session started");
        Ok(Self {
            fc,
            log,
            mixer: StickMixer::new(left, right),
            controller,
            dispatch,
            poller,
            relay,
            shutdown_tx,
            tasks: Mutex::new(tasks),
            closed: AtomicBool::new(false),
        })
    }

    pub fn log(&self) -> &DebugLog {
        &self.log
    }

    pub fn controller(&self) -> &Arc<MissionController<F, P>> {
        &self.controller
    }

    pub fn poller(&self) -> &Arc<Poller<F>> {
        &self.poller
    }

    pub fn relay(&self) -> &EventRelay {
        &self.relay
    }

    pub fn flight_status(&self) -> FlightStatus {
        self.relay.flight_status()
    }

    pub fn subscribe_flight_status(&self) -> watch::Receiver<FlightStatus> {
        self.relay.subscribe_flight_status()
    }

    pub fn readiness(&self) -> Option<Readiness> {
        self.poller.readiness()
    }

    pub fn altitude(&self) -> Option<AltitudeInfo> {
        self.poller.altitude()
    }

    pub fn mission_state(&self) -> MissionState {
        self.controller.state()
    }

    pub fn control_state(&self) -> ControlState {
        self.controller.control_state()
    }

    pub fn subscribe_control_state(&self) -> watch::Receiver<ControlState> {
        self.controller.subscribe()
    }

    pub fn mission_progress(&self) -> Option<MissionProgress> {
        self.controller.progress()
    }

    pub fn subscribe_outcomes(&self) -> broadcast::Receiver<MissionOutcome> {
        self.controller.subscribe_outcomes()
    }

    // ----- sticks -----

    pub fn surface(&self, side: StickSide) -> &InputSurface {
        self.mixer.surface(side)
    }

    /// Feeds one gesture frame from a pad; returns the merged command.
    pub fn on_stick_change(&self, side: StickSide, dx: f64, dy: f64) -> StickAxes {
        let axes = self.mixer.apply(side, dx, dy);
        self.dispatch.on_input_change(axes);
        axes
    }

    /// Releasing either pad stops the aircraft on every channel.
    pub async fn on_stick_release(&self, side: StickSide) -> bool {
        debug!("session: {:?} stick released", side);
        self.mixer.reset();
        self.dispatch.on_input_release().await
    }

    // ----- flight commands -----

    pub async fn takeoff(&self) -> Result<(), FcError> {
        self.command("Takeoff", self.fc.request_takeoff().await)
    }

    pub async fn land(&self) -> Result<(), FcError> {
        self.command("Landing", self.fc.request_landing().await)
    }

    pub async fn cancel_landing(&self) -> Result<(), FcError> {
        self.command("Cancel landing", self.fc.cancel_landing().await)
    }

    fn command(&self, what: &str, res: Result<(), FcError>) -> Result<(), FcError> {
        match &res {
            Ok(()) => self.log.info(format!("{} requested", what)),
            Err(e) => self.log.error(format!("{} request failed: {}", what, e)),
        }
        res
    }

    pub async fn set_manual_virtual_stick(&self, enabled: bool) -> Result<(), MissionError> {
        self.controller.set_manual_virtual_stick(enabled).await
    }

    // ----- missions -----

    pub async fn start_mission(&self, handle: &str) -> Result<(), MissionError> {
        self.controller.start(handle).await
    }

    pub async fn pause_mission(&self) -> Result<(), MissionError> {
        self.controller.pause().await
    }

    pub async fn resume_mission(&self) -> Result<(), MissionError> {
        self.controller.resume().await
    }

    pub async fn stop_mission(&self) -> Result<(), MissionError> {
        self.controller.stop().await
    }

    // ----- teardown -----

    /// Stops both timers and the dispatcher, revokes every subscription and
    /// waits for the background tasks. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.signal_shutdown();
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|e| e.into_inner()));
        for t in tasks {
            if let Err(e) = t.await {
                debug!("session: task ended with {}", e);
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl<F: ?Sized, P: ?Sized> FlightSession<F, P> {
    fn signal_shutdown(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.shutdown_tx.send_replace(true);
        self.dispatch.close();
        self.relay.shutdown();
        info!("session: shut down");
        self.log.info("Session closed");
        true
    }
}

impl<F: ?Sized, P: ?Sized> Drop for FlightSession<F, P> {
    fn drop(&mut self) {
        self.signal_shutdown();
    }
}
