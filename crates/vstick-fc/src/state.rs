use std::time::{Duration, Instant};

/// Health of the serial MAVLink link, updated by the reader task.
#[derive(Debug, Clone, Default)]
pub struct LinkStatus {
    pub connected: bool,
    pub port: Option<String>,
    pub baud: Option<u32>,
    pub last_heartbeat: Option<Instant>,
    pub messages_seen: u64,
    pub last_msg: Option<String>,
    pub last_error: Option<String>,
}

impl LinkStatus {
    pub fn hb_age(&self) -> Option<Duration> {
        self.last_heartbeat.map(|t| t.elapsed())
    }

    /// A link counts as alive while heartbeats keep arriving within `timeout`.
    pub fn is_alive(&self, timeout: Duration) -> bool {
        self.hb_age().map(|age| age <= timeout).unwrap_or(false)
    }
}
