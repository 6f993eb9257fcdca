//! Mission lifecycle state machine.
//!
//! ```text
//!   Idle --start--> Running --pause--> Paused --resume--> Running
//!   Running|Paused --stop--> Stopped --> Idle
//!   Running --completed|failed--> Idle
//! ```
//!
//! The controller is the only writer of both the mission state and the
//! virtual-stick flag, and publishes them as one value so no observer can see
//! `virtual_stick != (mission == Running)` while a mission is active.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, watch};
use tracing::debug;

use vstick_fc::{FcError, FlightController, MissionPlanner};
use vstick_proto::{ControlMode, MissionEvent, MissionOutcome, MissionProgress, MissionState};

use crate::cell::StateCell;
use crate::debuglog::DebugLog;
use crate::error::{ConfigError, MissionError};

/// Mission state and virtual-stick flag, always published together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlState {
    pub mission: MissionState,
    pub virtual_stick: bool,
}

impl ControlState {
    fn mission(mission: MissionState) -> Self {
        Self { mission, virtual_stick: mission == MissionState::Running }
    }
}

pub struct MissionController<F: ?Sized, P: ?Sized> {
    fc: Arc<F>,
    planner: Arc<P>,
    control: StateCell<ControlState>,
    gate: StateCell<bool>,
    progress: StateCell<Option<MissionProgress>>,
    outcomes: broadcast::Sender<MissionOutcome>,
    active_mission: Mutex<Option<String>>,
    control_mode_ready: AtomicBool,
    op: tokio::sync::Mutex<()>,
    log: DebugLog,
}

impl<F, P> MissionController<F, P>
where
    F: FlightController + ?Sized,
    P: MissionPlanner + ?Sized,
{
    pub fn new(fc: Arc<F>, planner: Arc<P>, log: DebugLog) -> Self {
        let (outcomes, _) = broadcast::channel(16);
        Self {
            fc,
            planner,
            control: StateCell::new(ControlState::default()),
            gate: StateCell::new(false),
            progress: StateCell::new(None),
            outcomes,
            active_mission: Mutex::new(None),
            control_mode_ready: AtomicBool::new(false),
            op: tokio::sync::Mutex::new(()),
            log,
        }
    }

    pub fn state(&self) -> MissionState {
        self.control.get().mission
    }

    pub fn virtual_stick_enabled(&self) -> bool {
        self.control.get().virtual_stick
    }

    pub fn control_state(&self) -> ControlState {
        self.control.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<ControlState> {
        self.control.subscribe()
    }

    /// Plain enable flag for the stick dispatcher.
    pub fn virtual_stick_gate(&self) -> watch::Receiver<bool> {
        self.gate.subscribe()
    }

    pub fn progress(&self) -> Option<MissionProgress> {
        self.progress.get()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<Option<MissionProgress>> {
        self.progress.subscribe()
    }

    pub fn subscribe_outcomes(&self) -> broadcast::Receiver<MissionOutcome> {
        self.outcomes.subscribe()
    }

    pub fn active_mission(&self) -> Option<String> {
        self.active_mission.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn control_mode_ready(&self) -> bool {
        self.control_mode_ready.load(Ordering::SeqCst)
    }

    fn publish(&self, next: ControlState) {
        self.control.set(next);
        self.gate.set(next.virtual_stick);
    }

    fn set_active(&self, handle: Option<String>) {
        *self.active_mission.lock().unwrap_or_else(|e| e.into_inner()) = handle;
    }

    fn require(&self, operation: &'static str, allowed: &[MissionState]) -> Result<MissionState, MissionError> {
        let state = self.state();
        if allowed.contains(&state) {
            Ok(state)
        } else {
            self.log.warn(format!("Cannot {} while mission is {:?}", operation, state));
            Err(MissionError::InvalidTransition { operation, state })
        }
    }

    fn service_error(&self, operation: &'static str, e: FcError) -> MissionError {
        self.log.error(format!("Mission {} failed: {}", operation, e.reason()));
        MissionError::service(operation, e)
    }

    /// Undo a virtual-stick toggle after the planner refused the operation.
    async fn roll_back_stick(&self, enabled: bool) {
        if let Err(e) = self.fc.set_virtual_stick_enabled(enabled).await {
            self.log.error(format!(
                "Virtual stick rollback to {} failed, check aircraft control: {}",
                enabled, e
            ));
        }
    }

    /// Pushes the control mode; required once before any enable.
    pub async fn configure_control_mode(&self, mode: ControlMode) -> Result<(), FcError> {
        match self.fc.set_virtual_stick_control_mode(mode).await {
            Ok(()) => {
                self.control_mode_ready.store(true, Ordering::SeqCst);
                debug!("mission: control mode configured {:?}", mode);
                Ok(())
            }
            Err(e) => {
                self.control_mode_ready.store(false, Ordering::SeqCst);
                self.log.error(format!("Virtual stick control mode rejected: {}", e));
                Err(e)
            }
        }
    }

    pub async fn start(&self, handle: &str) -> Result<(), MissionError> {
        let _op = self.op.lock().await;
        self.require("start", &[MissionState::Idle])?;
        if !self.control_mode_ready() {
            self.log.error("Mission start refused: virtual stick control mode not configured");
            return Err(ConfigError::ControlModeNotConfigured.into());
        }

        self.planner
            .start_mission(handle)
            .await
            .map_err(|e| self.service_error("start", e))?;

        self.progress.set(None);
        self.set_active(Some(handle.to_string()));
        self.publish(ControlState::mission(MissionState::Running));
        self.log.info(format!("Mission '{}' started", handle));
        Ok(())
    }

    pub async fn pause(&self) -> Result<(), MissionError> {
        let _op = self.op.lock().await;
        self.require("pause", &[MissionState::Running])?;

        self.fc
            .set_virtual_stick_enabled(false)
            .await
            .map_err(|e| self.service_error("pause", e))?;

        if let Err(e) = self.planner.pause_mission().await {
            self.roll_back_stick(true).await;
            return Err(self.service_error("pause", e));
        }

        self.publish(ControlState::mission(MissionState::Paused));
        self.log.info("Mission paused, manual control");
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), MissionError> {
        let _op = self.op.lock().await;
        self.require("resume", &[MissionState::Paused])?;

        self.fc
            .set_virtual_stick_enabled(true)
            .await
            .map_err(|e| self.service_error("resume", e))?;

        if let Err(e) = self.planner.resume_mission().await {
            self.roll_back_stick(false).await;
            return Err(self.service_error("resume", e));
        }

        self.publish(ControlState::mission(MissionState::Running));
        self.log.info("Mission resumed");
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), MissionError> {
        let _op = self.op.lock().await;
        let from = self.require("stop", &[MissionState::Running, MissionState::Paused])?;

        let was_running = from == MissionState::Running;
        if was_running {
            self.fc
                .set_virtual_stick_enabled(false)
                .await
                .map_err(|e| self.service_error("stop", e))?;
        }

        if let Err(e) = self.planner.stop_mission().await {
            if was_running {
                self.roll_back_stick(true).await;
            }
            return Err(self.service_error("stop", e));
        }

        self.publish(ControlState::mission(MissionState::Stopped));
        self.finish_to_idle();
        self.log.info("Mission stopped");
        Ok(())
    }

    fn finish_to_idle(&self) {
        self.set_active(None);
        self.publish(ControlState::mission(MissionState::Idle));
    }

    /// Manual flight outside a mission. Rejected while a mission is active.
    pub async fn set_manual_virtual_stick(&self, enabled: bool) -> Result<(), MissionError> {
        let _op = self.op.lock().await;
        self.require("toggle virtual stick", &[MissionState::Idle])?;
        if enabled && !self.control_mode_ready() {
            return Err(ConfigError::ControlModeNotConfigured.into());
        }
        self.fc
            .set_virtual_stick_enabled(enabled)
            .await
            .map_err(|e| self.service_error("toggle virtual stick", e))?;
        self.publish(ControlState { mission: MissionState::Idle, virtual_stick: enabled });
        self.log.info(format!("Virtual stick {}", if enabled { "enabled" } else { "disabled" }));
        Ok(())
    }

    /// Progress/terminal notifications relayed from the flight controller.
    pub async fn on_mission_event(&self, event: MissionEvent) {
        let _op = self.op.lock().await;
        let state = self.state();
        match event {
            MissionEvent::Progress(p) => {
                if !matches!(state, MissionState::Running | MissionState::Paused) {
                    debug!("mission: progress while {:?} ignored", state);
                    return;
                }
                let was_waiting = self
                    .progress
                    .get()
                    .map(|prev| prev.distance_to_target.is_awaiting_gps())
                    .unwrap_or(false);
                if state == MissionState::Running && p.distance_to_target.is_awaiting_gps() && !was_waiting {
                    self.log.warn("Holding position, waiting for GPS lock");
                }
                self.progress.set(Some(p));
            }
            MissionEvent::Completed => {
                if state != MissionState::Running {
                    debug!("mission: completion while {:?} ignored", state);
                    return;
                }
                self.end_mission(MissionOutcome::Completed).await;
            }
            MissionEvent::Failed { reason } => {
                if state != MissionState::Running {
                    self.log.warn(format!("Mission failure reported while {:?}: {}", state, reason));
                    return;
                }
                self.end_mission(MissionOutcome::Failed { reason }).await;
            }
            MissionEvent::Started | MissionEvent::Paused | MissionEvent::Resumed => {
                debug!("mission: controller acknowledged {:?} while {:?}", event, state);
            }
        }
    }

    async fn end_mission(&self, outcome: MissionOutcome) {
        // the controller stops flying the mission; hand sticks back
        if let Err(e) = self.fc.set_virtual_stick_enabled(false).await {
            self.log.error(format!("Virtual stick disable after mission end failed: {}", e));
        }
        let name = self.active_mission().unwrap_or_default();
        match &outcome {
            MissionOutcome::Completed => self.log.info(format!("Mission '{}' complete", name)),
            MissionOutcome::Failed { reason } => self.log.error(format!("Mission '{}' failed: {}", name, reason)),
        }
        self.finish_to_idle();
        if self.outcomes.send(outcome).is_err() {
            debug!("mission: no outcome observers");
        }
    }

    /// Virtual-stick reports from the flight controller are advisory; the
    /// controller keeps its own flag and only flags disagreement.
    pub async fn on_virtual_stick_report(&self, enabled: bool) {
        let _op = self.op.lock().await;
        let cur = self.control.get();
        if cur.virtual_stick != enabled {
            self.log.warn(format!(
                "Flight controller reports virtual stick {} while mission {:?}",
                if enabled { "enabled" } else { "disabled" },
                cur.mission
            ));
        } else {
            debug!("mission: virtual stick report {} matches", enabled);
        }
    }
}
