use anyhow::Result;

use vstick_proto::AxisAssignment;

use crate::session::{SessionConfig, StickConfig};

pub fn check_sticks(sticks: &StickConfig) -> Result<()> {
    let usable = sticks.travel_radius - sticks.knob_radius;
    anyhow::ensure!(sticks.knob_radius >= 0.0, "sticks.knob_radius must not be negative");
    anyhow::ensure!(usable.is_finite() && usable > 0.0, "sticks.travel_radius must exceed sticks.knob_radius");
    // usable travel under ~10 px makes the pad twitchy
    if usable < 10.0 {
        tracing::warn!("doctor: usable stick travel only {:.1}", usable);
    }
    anyhow::ensure!(sticks.left != sticks.right, "sticks.left and sticks.right drive the same channels");
    if sticks.left != AxisAssignment::YawThrottle {
        tracing::info!("doctor: left pad drives {:?} (mode 1 layout)", sticks.left);
    }
    Ok(())
}

pub fn check_timing(cfg: &SessionConfig) -> Result<()> {
    anyhow::ensure!(cfg.dispatch.min_interval_ms >= 10, "dispatch.min_interval_ms below 10 floods the link");
    anyhow::ensure!(cfg.dispatch.min_interval_ms <= 500, "dispatch.min_interval_ms above 500 makes sticks unflyable");
    anyhow::ensure!(cfg.poll.readiness_interval_ms >= 500, "poll.readiness_interval_ms too small");
    anyhow::ensure!(cfg.poll.altitude_interval_ms >= 200, "poll.altitude_interval_ms too small");
    Ok(())
}

pub fn check_log(cfg: &SessionConfig) -> Result<()> {
    anyhow::ensure!(cfg.log.capacity >= 1, "log.capacity must be at least 1");
    anyhow::ensure!(cfg.log.capacity <= 10_000, "log.capacity unreasonably large");
    Ok(())
}

/// All session checks, then the same validation `FlightSession::start` runs.
pub fn check_session(cfg: &SessionConfig) -> Result<()> {
    check_sticks(&cfg.sticks)?;
    check_timing(cfg)?;
    check_log(cfg)?;
    cfg.validate()?;
    Ok(())
}
