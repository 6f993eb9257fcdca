use std::collections::HashMap;
use std::time::{Duration, Instant};

/// High-level commands the MAVLink link guards against double submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardedCommand {
    Takeoff,
    Land,
    Hold,
    MissionStart,
    Pause,
    Resume,
}

impl GuardedCommand {
    pub fn label(&self) -> &'static str {
        match self {
            GuardedCommand::Takeoff => "takeoff",
            GuardedCommand::Land => "land",
            GuardedCommand::Hold => "hold",
            GuardedCommand::MissionStart => "mission start",
            GuardedCommand::Pause => "pause",
            GuardedCommand::Resume => "resume",
        }
    }
}

#[derive(Debug)]
pub struct CommandRateLimit {
    last: HashMap<GuardedCommand, Instant>,
    min_interval: Duration,
}

impl CommandRateLimit {
    pub fn new(min_interval: Duration) -> Self {
        Self { last: HashMap::new(), min_interval }
    }

    pub fn allow(&mut self, cmd: GuardedCommand) -> bool {
        self.allow_at(cmd, Instant::now())
    }

    fn allow_at(&mut self, cmd: GuardedCommand, now: Instant) -> bool {
        if let Some(t) = self.last.get(&cmd) {
            if now.duration_since(*t) < self.min_interval { return false; }
        }
        self.last.insert(cmd, now);
        true
    }
}
