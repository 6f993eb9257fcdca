use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use vstick_fc::{FlightController, MissionPlanner, Subscription};
use vstick_proto::{EventCategory, FcEvent, FlightStatus};

use crate::cell::StateCell;
use crate::debuglog::DebugLog;
use crate::error::SessionError;
use crate::mission::MissionController;

/// Bridges flight-controller callbacks into the session.
///
/// Every upstream callback only enqueues; one pump task delivers each event to
/// its single owner, so lifecycle handling never runs concurrently with itself.
pub struct EventRelay {
    subscriptions: Mutex<Vec<Subscription>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    flight_status: Arc<StateCell<FlightStatus>>,
}

impl EventRelay {
    pub async fn start<F, P>(
        fc: Arc<F>,
        controller: Arc<MissionController<F, P>>,
        log: DebugLog,
    ) -> Result<Self, SessionError>
    where
        F: FlightController + ?Sized + 'static,
        P: MissionPlanner + ?Sized + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<FcEvent>();

        let mut subscriptions = Vec::with_capacity(EventCategory::ALL.len());
        for category in EventCategory::ALL {
            let tx = tx.clone();
            let handler = Arc::new(move |ev: FcEvent| {
                if tx.send(ev).is_err() {
                    debug!("relay: event after shutdown dropped");
                }
            });
            match fc.subscribe(category, handler) {
                Ok(sub) => subscriptions.push(sub),
                Err(e) => {
                    log.error(format!("Subscribe to {:?} events failed: {}", category, e));
                    for sub in &subscriptions {
                        sub.revoke();
                    }
                    return Err(SessionError::Setup { stage: "event subscription", source: e });
                }
            }
        }
        drop(tx);

        let initial = match fc.flight_status().await {
            Ok(s) => s,
            Err(e) => {
                log.warn(format!("Initial flight status unavailable: {}", e));
                FlightStatus::default()
            }
        };
        let flight_status = Arc::new(StateCell::new(initial));

        let pump = tokio::spawn(pump(rx, controller, flight_status.clone(), log));

        Ok(Self {
            subscriptions: Mutex::new(subscriptions),
            pump: Mutex::new(Some(pump)),
            flight_status,
        })
    }

    pub fn flight_status(&self) -> FlightStatus {
        self.flight_status.get()
    }

    pub fn subscribe_flight_status(&self) -> watch::Receiver<FlightStatus> {
        self.flight_status.subscribe()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|s| s.is_active())
            .count()
    }

    /// Revokes everything still held and stops the pump. Safe to repeat.
    pub fn shutdown(&self) -> usize {
        let subs: Vec<Subscription> = std::mem::take(&mut *self.subscriptions.lock().unwrap_or_else(|e| e.into_inner()));
        let revoked = subs.iter().filter(|s| s.revoke()).count();
        if let Some(pump) = self.pump.lock().unwrap_or_else(|e| e.into_inner()).take() {
            pump.abort();
        }
        if revoked > 0 {
            debug!("relay: revoked {} subscriptions", revoked);
        }
        revoked
    }
}

impl Drop for EventRelay {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn pump<F, P>(
    mut rx: mpsc::UnboundedReceiver<FcEvent>,
    controller: Arc<MissionController<F, P>>,
    flight_status: Arc<StateCell<FlightStatus>>,
    log: DebugLog,
) where
    F: FlightController + ?Sized,
    P: MissionPlanner + ?Sized,
{
    while let Some(event) = rx.recv().await {
        match event {
            FcEvent::Mission(ev) => controller.on_mission_event(ev).await,
            FcEvent::VirtualStickChanged { enabled } => controller.on_virtual_stick_report(enabled).await,
            FcEvent::FlightStatusChanged(status) => {
                let prev = flight_status.get();
                if prev.is_flying != status.is_flying {
                    log.info(if status.is_flying { "Aircraft airborne" } else { "Aircraft on ground" });
                }
                if prev.is_connected != status.is_connected {
                    if status.is_connected {
                        log.info("Flight controller connected");
                    } else {
                        log.warn("Flight controller disconnected");
                    }
                }
                flight_status.set(status);
            }
            FcEvent::TakeoffResult { ok, reason } => {
                if ok {
                    log.info("Takeoff accepted");
                } else {
                    log.error(format!("Takeoff failed: {}", reason.unwrap_or_else(|| "unknown".into())));
                }
            }
            FcEvent::LandingResult { ok, reason } => {
                if ok {
                    log.info("Landing accepted");
                } else {
                    log.error(format!("Landing failed: {}", reason.unwrap_or_else(|| "unknown".into())));
                }
            }
        }
    }
    debug!("relay: pump stopped");
}
