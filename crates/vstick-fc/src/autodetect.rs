use anyhow::{Context, Result};
use mavlink::common::MavMessage;
use mavlink::error::MessageReadError;
use mavlink::MavlinkVersion;
use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};
use tracing::{info, trace, warn};

/// Per-read serial timeout; bounds how far one attempt can overrun its window.
const READ_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct PortAttempt {
    pub dev: String,
    pub baud: u32,
    pub hb_seen: bool,
    pub elapsed_ms: u64,
    pub note: String,
}

#[derive(Debug, Clone)]
pub struct AutodetectResult {
    pub chosen: Option<(String, u32)>,
    pub attempts: Vec<PortAttempt>,
}

pub fn default_candidate_devs() -> Vec<String> {
    vec![
        "/dev/ttyACM0".into(),
        "/dev/ttyACM1".into(),
        "/dev/ttyUSB0".into(),
        "/dev/ttyUSB1".into(),
        "/dev/serial0".into(),
        "/dev/ttyAMA0".into(),
    ]
}

pub fn default_candidate_bauds() -> Vec<u32> {
    vec![115200, 57600, 921600]
}

/// Listens on one port for a HEARTBEAT from `target_sys`.
fn listen_once(dev: &str, baud: u32, target_sys: u8, timeout: Duration) -> Result<bool> {
    let mut port = tokio_serial::new(dev, baud)
        .timeout(READ_SLICE.min(timeout))
        .open()
        .with_context(|| format!("open serial {} @ {}", dev, baud))?;
    wait_for_heartbeat(&mut port, target_sys, timeout).with_context(|| format!("read {}", dev))
}

/// Reads frames until a HEARTBEAT from `target_sys` shows up or `timeout`
/// passes. `port` must time out its reads, so a silent line can't hold the
/// attempt past the deadline. Garbage and v1 frames are skipped.
fn wait_for_heartbeat<R: Read>(port: &mut R, target_sys: u8, timeout: Duration) -> std::io::Result<bool> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        match mavlink::read_versioned_msg::<MavMessage, _>(port, MavlinkVersion::V2) {
            Ok((hdr, MavMessage::HEARTBEAT(_))) if hdr.system_id == target_sys => return Ok(true),
            Ok((hdr, _)) => trace!("autodetect: skipping msg from sys {}", hdr.system_id),
            Err(MessageReadError::Io(e))
                if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted) => {}
            Err(MessageReadError::Io(e)) => return Err(e),
            Err(MessageReadError::Parse(_)) => {}
        }
    }
    Ok(false)
}

/// Walks every device/baud pair and stops at the first one that answers.
pub fn autodetect_fc(
    candidate_devs: Vec<String>,
    candidate_bauds: Vec<u32>,
    target_sys: u8,
    heartbeat_timeout: Duration,
) -> AutodetectResult {
    let mut attempts = Vec::new();

    for dev in candidate_devs {
        if !std::path::Path::new(&dev).exists() {
            continue;
        }
        for baud in &candidate_bauds {
            let start = Instant::now();
            let (hb_seen, note) = match listen_once(&dev, *baud, target_sys, heartbeat_timeout) {
                Ok(true) => (true, "heartbeat".to_string()),
                Ok(false) => (false, "no heartbeat".to_string()),
                Err(e) => {
                    warn!("fc autodetect attempt failed dev={} baud={} err={:#}", dev, baud, e);
                    (false, format!("open/connect failed: {:#}", e))
                }
            };
            attempts.push(PortAttempt {
                dev: dev.clone(),
                baud: *baud,
                hb_seen,
                elapsed_ms: start.elapsed().as_millis() as u64,
                note,
            });
            if hb_seen {
                info!("fc autodetect: OK {} @ {}", dev, baud);
                return AutodetectResult { chosen: Some((dev, *baud)), attempts };
            }
        }
    }

    AutodetectResult { chosen: None, attempts }
}
