use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use vstick_fc::FlightController;
use vstick_proto::{AltitudeInfo, FlightStatus, ReadinessCheck, ReadinessLevel};

use crate::cell::StateCell;
use crate::debuglog::DebugLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    Readiness,
    Altitude,
}

impl PollMode {
    fn for_status(status: &FlightStatus) -> Self {
        if status.is_flying { PollMode::Altitude } else { PollMode::Readiness }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    pub readiness_interval_ms: u64,
    pub altitude_interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { readiness_interval_ms: 5000, altitude_interval_ms: 2000 }
    }
}

impl PollConfig {
    fn period(&self, mode: PollMode) -> Duration {
        match mode {
            PollMode::Readiness => Duration::from_millis(self.readiness_interval_ms),
            PollMode::Altitude => Duration::from_millis(self.altitude_interval_ms),
        }
    }
}

/// Latest readiness answer with its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    pub check: ReadinessCheck,
    pub level: ReadinessLevel,
}

/// Readiness-or-altitude polling. A single task owns the active loop, so the
/// two cadences can never overlap.
pub struct Poller<F: ?Sized> {
    fc: Arc<F>,
    cfg: PollConfig,
    readiness: StateCell<Option<Readiness>>,
    altitude: StateCell<Option<AltitudeInfo>>,
    active: StateCell<Option<PollMode>>,
    log: DebugLog,
}

impl<F: FlightController + ?Sized + 'static> Poller<F> {
    pub fn new(fc: Arc<F>, cfg: PollConfig, log: DebugLog) -> Arc<Self> {
        Arc::new(Self {
            fc,
            cfg,
            readiness: StateCell::new(None),
            altitude: StateCell::new(None),
            active: StateCell::new(None),
            log,
        })
    }

    pub fn readiness(&self) -> Option<Readiness> {
        self.readiness.get()
    }

    pub fn subscribe_readiness(&self) -> watch::Receiver<Option<Readiness>> {
        self.readiness.subscribe()
    }

    pub fn altitude(&self) -> Option<AltitudeInfo> {
        self.altitude.get()
    }

    pub fn subscribe_altitude(&self) -> watch::Receiver<Option<AltitudeInfo>> {
        self.altitude.subscribe()
    }

    /// Which loop is running, `None` once stopped.
    pub fn active_mode(&self) -> Option<PollMode> {
        self.active.get()
    }

    pub fn subscribe_active_mode(&self) -> watch::Receiver<Option<PollMode>> {
        self.active.subscribe()
    }

    /// Runs until `shutdown` flips to true or its sender is dropped.
    pub fn spawn(
        self: &Arc<Self>,
        status: watch::Receiver<FlightStatus>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.run(status, shutdown).await })
    }

    async fn run(self: Arc<Self>, mut status: watch::Receiver<FlightStatus>, mut shutdown: watch::Receiver<bool>) {
        let mut mode = PollMode::for_status(&status.borrow_and_update());
        'modes: loop {
            if *shutdown.borrow() {
                break;
            }
            self.active.set(Some(mode));
            info!("poller: {:?} every {:?}", mode, self.cfg.period(mode));

            // first tick completes immediately
            let mut ticker = tokio::time::interval(self.cfg.period(mode));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    wake = next_signal(&mut shutdown, &mut status, mode) => match wake {
                        Signal::Stop => break 'modes,
                        Signal::Switch(next) => {
                            mode = next;
                            continue 'modes;
                        }
                        Signal::Stay => {}
                    },
                    _ = ticker.tick() => {
                        // an in-flight call is dropped if the mode changes under it
                        let poll = self.poll_once(mode);
                        tokio::pin!(poll);
                        loop {
                            tokio::select! {
                                biased;
                                wake = next_signal(&mut shutdown, &mut status, mode) => match wake {
                                    Signal::Stop => break 'modes,
                                    Signal::Switch(next) => {
                                        debug!("poller: {:?} call abandoned", mode);
                                        mode = next;
                                        continue 'modes;
                                    }
                                    Signal::Stay => {}
                                },
                                _ = &mut poll => break,
                            }
                        }
                    }
                }
            }
        }
        self.active.set(None);
        debug!("poller: stopped");
    }

    async fn poll_once(&self, mode: PollMode) {
        match mode {
            PollMode::Readiness => match self.fc.is_ready_for_takeoff().await {
                Ok(check) => {
                    let level = check.level();
                    let prev = self.readiness.get().map(|r| r.level);
                    if prev != Some(level) {
                        self.log.info(format!("Readiness {:?}: {}", level, check.reason));
                    }
                    self.readiness.set(Some(Readiness { check, level }));
                }
                Err(e) => self.log.warn(format!("Readiness check failed: {}", e)),
            },
            PollMode::Altitude => match self.fc.altitude().await {
                Ok(alt) => {
                    self.altitude.set(Some(alt));
                }
                Err(e) => self.log.warn(format!("Altitude poll failed: {}", e)),
            },
        }
    }
}

enum Signal {
    Stop,
    Switch(PollMode),
    Stay,
}

/// Waits for shutdown or a flight-status change. Both `changed()` calls are
/// cancel safe, so losing a race against the ticker or a poll drops nothing.
async fn next_signal(
    shutdown: &mut watch::Receiver<bool>,
    status: &mut watch::Receiver<FlightStatus>,
    mode: PollMode,
) -> Signal {
    tokio::select! {
        biased;
        res = shutdown.changed() => {
            if res.is_err() || *shutdown.borrow() { Signal::Stop } else { Signal::Stay }
        }
        res = status.changed() => {
            if res.is_err() {
                return Signal::Stop;
            }
            let next = PollMode::for_status(&status.borrow_and_update());
            if next != mode {
                debug!("poller: switching {:?} -> {:?}", mode, next);
                Signal::Switch(next)
            } else {
                Signal::Stay
            }
        }
    }
}
