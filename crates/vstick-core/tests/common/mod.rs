#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use vstick_fc::{EventBus, EventHandler, FcError, FlightController, MissionPlanner, Subscription};
use vstick_proto::{
    AltitudeInfo, ControlMode, EventCategory, FcEvent, FlightStatus, ReadinessCheck, StickAxes,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Readiness,
    Takeoff,
    Land,
    CancelLanding,
    VirtualStick(bool),
    ControlMode(ControlMode),
    Stick(StickAxes),
    FlightStatus,
    Altitude,
    StartMission(String),
    PauseMission,
    ResumeMission,
    StopMission,
}

/// Fails the named operation the given number of times.
#[derive(Default)]
struct Faults {
    remaining: HashMap<&'static str, usize>,
}

impl Faults {
    fn check(&mut self, op: &'static str) -> Result<(), FcError> {
        match self.remaining.get_mut(op) {
            Some(n) if *n > 0 => {
                *n -= 1;
                Err(FcError::rejected(op, "injected"))
            }
            _ => Ok(()),
        }
    }
}

/// Scripted aircraft. Every call is recorded in order when it is issued,
/// shared with the planner so cross-trait ordering can be asserted. Calls that
/// succeed are also recorded in `landed` once their delay has passed.
pub struct MockFc {
    pub bus: EventBus,
    calls: Mutex<Vec<(Instant, Call)>>,
    landed: Mutex<Vec<Call>>,
    delays: Mutex<HashMap<&'static str, Duration>>,
    faults: Mutex<Faults>,
    status: Mutex<FlightStatus>,
    readiness: Mutex<ReadinessCheck>,
    altitude: Mutex<f64>,
    fail_subscribe: Mutex<Option<EventCategory>>,
}

impl MockFc {
    pub fn new() -> Self {
        Self {
            bus: EventBus::new(),
            calls: Mutex::new(Vec::new()),
            landed: Mutex::new(Vec::new()),
            delays: Mutex::new(HashMap::new()),
            faults: Mutex::new(Faults::default()),
            status: Mutex::new(FlightStatus { is_connected: true, ..Default::default() }),
            readiness: Mutex::new(ReadinessCheck::ready("Ready to fly")),
            altitude: Mutex::new(0.0),
            fail_subscribe: Mutex::new(None),
        }
    }

    /// Fail `op` for the next `times` calls. Names match the trait methods.
    pub fn fail(&self, op: &'static str, times: usize) {
        self.faults.lock().unwrap().remaining.insert(op, times);
    }

    /// Every later call to `op` takes `by` before it answers.
    pub fn delay(&self, op: &'static str, by: Duration) {
        self.delays.lock().unwrap().insert(op, by);
    }

    pub fn fail_subscribe(&self, category: EventCategory) {
        *self.fail_subscribe.lock().unwrap() = Some(category);
    }

    pub fn set_readiness(&self, check: ReadinessCheck) {
        *self.readiness.lock().unwrap() = check;
    }

    pub fn set_altitude(&self, altitude: f64) {
        *self.altitude.lock().unwrap() = altitude;
    }

    pub fn emit(&self, event: FcEvent) {
        self.bus.emit(event);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn timed_calls(&self) -> Vec<(Instant, Call)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|(_, c)| pred(c)).count()
    }

    pub fn sticks(&self) -> Vec<StickAxes> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Stick(a) => Some(a),
                _ => None,
            })
            .collect()
    }

    /// Stick commands in the order the aircraft accepted them.
    pub fn landed_sticks(&self) -> Vec<StickAxes> {
        self.landed
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                Call::Stick(a) => Some(*a),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
        self.landed.lock().unwrap().clear();
    }

    pub fn listeners(&self) -> usize {
        EventCategory::ALL.iter().map(|c| self.bus.listener_count(*c)).sum()
    }

    async fn record(&self, op: &'static str, call: Call) -> Result<(), FcError> {
        self.calls.lock().unwrap().push((Instant::now(), call.clone()));
        let delay = self.delays.lock().unwrap().get(op).copied();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        self.faults.lock().unwrap().check(op)?;
        self.landed.lock().unwrap().push(call);
        Ok(())
    }
}

#[async_trait]
impl FlightController for MockFc {
    async fn is_ready_for_takeoff(&self) -> Result<ReadinessCheck, FcError> {
        self.record("is_ready_for_takeoff", Call::Readiness).await?;
        Ok(self.readiness.lock().unwrap().clone())
    }

    async fn request_takeoff(&self) -> Result<(), FcError> {
        self.record("request_takeoff", Call::Takeoff).await
    }

    async fn request_landing(&self) -> Result<(), FcError> {
        self.record("request_landing", Call::Land).await
    }

    async fn cancel_landing(&self) -> Result<(), FcError> {
        self.record("cancel_landing", Call::CancelLanding).await
    }

    async fn set_virtual_stick_enabled(&self, enabled: bool) -> Result<(), FcError> {
        self.record("set_virtual_stick_enabled", Call::VirtualStick(enabled)).await
    }

    async fn set_virtual_stick_control_mode(&self, mode: ControlMode) -> Result<(), FcError> {
        self.record("set_virtual_stick_control_mode", Call::ControlMode(mode)).await
    }

    async fn send_stick_command(&self, axes: StickAxes) -> Result<(), FcError> {
        self.record("send_stick_command", Call::Stick(axes)).await
    }

    async fn flight_status(&self) -> Result<FlightStatus, FcError> {
        self.record("flight_status", Call::FlightStatus).await?;
        Ok(self.status.lock().unwrap().clone())
    }

    async fn altitude(&self) -> Result<AltitudeInfo, FcError> {
        self.record("altitude", Call::Altitude).await?;
        Ok(AltitudeInfo { altitude: *self.altitude.lock().unwrap() })
    }

    fn subscribe(&self, category: EventCategory, handler: EventHandler) -> Result<Subscription, FcError> {
        if *self.fail_subscribe.lock().unwrap() == Some(category) {
            return Err(FcError::rejected("subscribe", "injected"));
        }
        Ok(self.bus.subscribe(category, handler))
    }
}

/// Mission planner that records into the aircraft's call log.
pub struct MockPlanner {
    fc: std::sync::Arc<MockFc>,
}

impl MockPlanner {
    pub fn new(fc: std::sync::Arc<MockFc>) -> Self {
        Self { fc }
    }
}

#[async_trait]
impl MissionPlanner for MockPlanner {
    async fn start_mission(&self, handle: &str) -> Result<(), FcError> {
        self.fc.record("start_mission", Call::StartMission(handle.to_string())).await
    }

    async fn pause_mission(&self) -> Result<(), FcError> {
        self.fc.record("pause_mission", Call::PauseMission).await
    }

    async fn resume_mission(&self) -> Result<(), FcError> {
        self.fc.record("resume_mission", Call::ResumeMission).await
    }

    async fn stop_mission(&self) -> Result<(), FcError> {
        self.fc.record("stop_mission", Call::StopMission).await
    }
}

pub fn axes(yaw: f64, throttle: f64, roll: f64, pitch: f64) -> StickAxes {
    StickAxes::new(yaw, throttle, roll, pitch)
}
