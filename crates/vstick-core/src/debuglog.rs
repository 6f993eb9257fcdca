use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use time::OffsetDateTime;
use tracing::{debug, error, info, warn};
use vstick_proto::{DebugLogEntry, LogLevel};

pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// Bounded ring of operator-visible diagnostics. Cheap to clone; all clones
/// share one buffer. Every entry is mirrored to `tracing`.
#[derive(Debug, Clone)]
pub struct DebugLog {
    inner: Arc<Mutex<VecDeque<DebugLogEntry>>>,
    capacity: usize,
}

impl DebugLog {
    /// `capacity` is raised to 1 if zero; validation happens at config load.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))), capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn append(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Debug => debug!(target: "vstick::debuglog", "{}", message),
            LogLevel::Info => info!(target: "vstick::debuglog", "{}", message),
            LogLevel::Warn => warn!(target: "vstick::debuglog", "{}", message),
            LogLevel::Error => error!(target: "vstick::debuglog", "{}", message),
        }
        let entry = DebugLogEntry { ts_unix_ms: now_unix_ms(), level, message };
        self.push(entry);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.append(LogLevel::Info, message)
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.append(LogLevel::Warn, message)
    }

    pub fn error(&self, message: impl Into<String>) {
        self.append(LogLevel::Error, message)
    }

    fn push(&self, entry: DebugLogEntry) {
        let mut buf = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if buf.len() == self.capacity {
            buf.pop_front();
        }
        buf.push_back(entry);
    }

    /// Empties the buffer, leaving only a marker entry.
    pub fn clear(&self) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.append(LogLevel::Info, "Log cleared");
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Oldest first.
    pub fn entries(&self) -> Vec<DebugLogEntry> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).iter().cloned().collect()
    }

    /// Newest first.
    pub fn entries_newest_first(&self) -> Vec<DebugLogEntry> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).iter().rev().cloned().collect()
    }
}

fn now_unix_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(entries: &[DebugLogEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.message.as_str()).collect()
    }

    #[test]
    fn overflow_evicts_exactly_the_oldest() {
        let log = DebugLog::new(3);
        for i in 0..5 {
            log.info(format!("m{}", i));
            assert!(log.len() <= 3);
        }
        assert_eq!(messages(&log.entries()), vec!["m2", "m3", "m4"]);
        assert_eq!(messages(&log.entries_newest_first()), vec!["m4", "m3", "m2"]);
    }

    #[test]
    fn clear_leaves_marker() {
        let log = DebugLog::new(10);
        log.warn("a");
        log.error("b");
        log.clear();
        let e = log.entries();
        assert_eq!(e.len(), 1);
        assert_eq!(e[0].message, "Log cleared");
        assert_eq!(e[0].level, LogLevel::Info);
    }

    #[test]
    fn clones_share_the_ring() {
        let a = DebugLog::new(2);
        let b = a.clone();
        a.info("x");
        b.info("y");
        assert_eq!(messages(&a.entries()), vec!["x", "y"]);
    }
}
