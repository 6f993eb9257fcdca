use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use vstick_fc::FlightController;
use vstick_proto::StickAxes;

use crate::debuglog::DebugLog;

pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(50);

/// Send-side pacing: minimum spacing plus suppression of repeats.
#[derive(Debug)]
struct Pacing {
    min_interval: Duration,
    last_sent: Option<Instant>,
    last_axes: Option<StickAxes>,
}

impl Pacing {
    fn new(min_interval: Duration) -> Self {
        Self { min_interval, last_sent: None, last_axes: None }
    }

    /// When the next command may go out, if it has to wait.
    fn ready_at(&self, now: Instant) -> Option<Instant> {
        let next = self.last_sent? + self.min_interval;
        (next > now).then_some(next)
    }

    fn is_duplicate(&self, axes: &StickAxes) -> bool {
        self.last_axes.as_ref() == Some(axes)
    }

    fn mark(&mut self, axes: StickAxes, now: Instant) {
        self.last_sent = Some(now);
        self.last_axes = Some(axes);
    }

    /// Keeps the spacing but lets the next value through even if it repeats.
    fn forget(&mut self) {
        self.last_axes = None;
    }
}

/// Latest undispatched value. `epoch` moves on every release; a value taken
/// under an older epoch must not reach the aircraft.
#[derive(Debug, Default)]
struct Slot {
    pending: Option<StickAxes>,
    epoch: u64,
}

/// Rate-limited, coalescing path from the stick mixer to the flight
/// controller, plus the unconditional stop on release.
pub struct DispatchLimiter<F: ?Sized> {
    fc: Arc<F>,
    gate: watch::Receiver<bool>,
    slot: Mutex<Slot>,
    wake: Notify,
    pacing: Mutex<Pacing>,
    // one command on the wire at a time
    send_lock: tokio::sync::Mutex<()>,
    log: DebugLog,
    closed: AtomicBool,
}

impl<F: FlightController + ?Sized + 'static> DispatchLimiter<F> {
    /// `gate` is the virtual-stick enable flag owned by the mission controller.
    pub fn new(fc: Arc<F>, gate: watch::Receiver<bool>, min_interval: Duration, log: DebugLog) -> Arc<Self> {
        Arc::new(Self {
            fc,
            gate,
            slot: Mutex::new(Slot::default()),
            wake: Notify::new(),
            pacing: Mutex::new(Pacing::new(min_interval)),
            send_lock: tokio::sync::Mutex::new(()),
            log,
            closed: AtomicBool::new(false),
        })
    }

    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.run().await })
    }

    fn gate_open(&self) -> bool {
        *self.gate.borrow()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn pacing(&self) -> std::sync::MutexGuard<'_, Pacing> {
        self.pacing.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Latest value wins; anything not yet sent is overwritten.
    pub fn on_input_change(&self, axes: StickAxes) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if !self.gate_open() {
            trace!("dispatch: virtual stick disabled, dropping {:?}", axes);
            return;
        }
        self.slot().pending = Some(axes);
        self.wake.notify_one();
    }

    /// Sends `{0,0,0,0}` without waiting on pacing or the gate. Anything
    /// pending or taken but not yet sent is superseded; a command already on
    /// the wire finishes first so the zero always lands last. One immediate
    /// retry on failure.
    pub async fn on_input_release(&self) -> bool {
        {
            let mut slot = self.slot();
            slot.pending = None;
            slot.epoch = slot.epoch.wrapping_add(1);
        }
        let _wire = self.send_lock.lock().await;
        self.pacing().mark(StickAxes::ZERO, Instant::now());

        for attempt in 0..2 {
            match self.fc.send_stick_command(StickAxes::ZERO).await {
                Ok(()) => {
                    debug!("dispatch: stop command sent");
                    return true;
                }
                Err(e) if attempt == 0 => {
                    self.log.warn(format!("Stop command failed, retrying: {}", e));
                }
                Err(e) => {
                    self.log.error(format!("Stop command failed after retry: {}", e));
                }
            }
        }
        self.pacing().forget();
        false
    }

    async fn run(self: Arc<Self>) {
        let mut gate = self.gate.clone();
        loop {
            self.wake.notified().await;
            if self.closed.load(Ordering::SeqCst) {
                break;
            }

            let wait = self.pacing().ready_at(Instant::now());
            if let Some(at) = wait {
                tokio::time::sleep_until(at).await;
            }

            let taken = {
                let mut slot = self.slot();
                slot.pending.take().map(|axes| (axes, slot.epoch))
            };
            let Some((axes, epoch)) = taken else {
                continue;
            };

            let _wire = self.send_lock.lock().await;
            if self.slot().epoch != epoch {
                trace!("dispatch: {:?} superseded by release", axes);
                continue;
            }
            // the aircraft was centred while the gate was shut, so a repeat
            // after it reopens is a real command
            if gate.has_changed().unwrap_or(false) {
                self.pacing().forget();
            }
            if !*gate.borrow_and_update() {
                trace!("dispatch: gate closed while pending, dropping");
                continue;
            }
            {
                let mut pacing = self.pacing();
                if pacing.is_duplicate(&axes) {
                    continue;
                }
                pacing.mark(axes, Instant::now());
            }

            if let Err(e) = self.fc.send_stick_command(axes).await {
                self.pacing().forget();
                self.log.warn(format!("Stick command failed: {}", e));
            }
        }
        debug!("dispatch: worker stopped");
    }
}

impl<F: ?Sized> DispatchLimiter<F> {
    /// Stops the worker; later changes are ignored. Release still works.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.slot.lock().unwrap_or_else(|e| e.into_inner()).pending = None;
            self.wake.notify_one();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pacing_waits_out_the_interval() {
        let t0 = Instant::now();
        let mut p = Pacing::new(Duration::from_millis(50));
        assert_eq!(p.ready_at(t0), None);
        p.mark(StickAxes::ZERO, t0);
        assert_eq!(p.ready_at(t0 + Duration::from_millis(20)), Some(t0 + Duration::from_millis(50)));
        assert_eq!(p.ready_at(t0 + Duration::from_millis(50)), None);
    }

    #[test]
    fn repeats_are_duplicates() {
        let mut p = Pacing::new(Duration::from_millis(50));
        let a = StickAxes::new(0.1, 0.0, 0.0, 0.0);
        assert!(!p.is_duplicate(&a));
        p.mark(a, Instant::now());
        assert!(p.is_duplicate(&a));
        assert!(!p.is_duplicate(&StickAxes::ZERO));
    }

    #[test]
    fn forget_keeps_spacing() {
        let t0 = Instant::now();
        let mut p = Pacing::new(Duration::from_millis(50));
        let a = StickAxes::new(0.0, 0.0, 0.7, 0.0);
        p.mark(a, t0);
        p.forget();
        assert!(!p.is_duplicate(&a));
        assert_eq!(p.ready_at(t0), Some(t0 + Duration::from_millis(50)));
    }
}
