use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use vstick_core::{doctor as session_doctor, FlightSession, SessionConfig};
use vstick_fc::autodetect::{autodetect_fc, default_candidate_bauds, default_candidate_devs, AutodetectResult};
use vstick_fc::mav::MavFlightController;
use vstick_fc::{FcConfig, FlightController};
use vstick_proto::{DebugLogEntry, StickSide};

use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "vstick", version, about = "vstick - virtual-stick flight control console")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the config file without touching the aircraft.
    Doctor,
    /// Open the flight controller and read operator commands from stdin.
    Run,
    Fc { #[command(subcommand)] cmd: FcCmd },
}

#[derive(Debug, Subcommand)]
enum FcCmd {
    /// Scan serial ports/bauds for MAVLink heartbeats.
    Autodetect,
    /// Connect briefly and print link health, flight status and readiness.
    Status,
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    fc: Option<FcConfig>,

    #[serde(flatten)]
    session: SessionConfig,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    toml::from_str(&s).context("parse config toml")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg).await?,
        Command::Run => run(&cfg).await?,
        Command::Fc { cmd } => fc_cmd(&cfg, cmd).await?,
    }
    Ok(())
}

async fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    session_doctor::check_session(&cfg.session)?;

    if let Some(fc) = &cfg.fc {
        if fc.enable {
            if fc.autodetect {
                info!("doctor: fc autodetect enabled (OK)");
            } else {
                anyhow::ensure!(fc.serial_dev.as_ref().map(|s| !s.is_empty()).unwrap_or(false), "fc.serial_dev missing");
                anyhow::ensure!(fc.baud.unwrap_or(0) > 0, "fc.baud invalid");
            }
            anyhow::ensure!(fc.send_heartbeat_hz.map(|hz| hz > 0.0).unwrap_or(true), "fc.send_heartbeat_hz must be positive");
            anyhow::ensure!(fc.takeoff_alt_m.map(|m| m > 0.5 && m < 20.0).unwrap_or(true), "fc.takeoff_alt_m should be 0.5..20");
        } else {
            warn!("doctor: fc.enable=false, `run` will refuse to start");
        }
    } else {
        warn!("doctor: no [fc] section");
    }

    info!("doctor: OK");
    Ok(())
}

async fn fc_cmd(cfg: &Config, cmd: FcCmd) -> Result<()> {
    let fc = cfg.fc.as_ref().context("no [fc] config section")?;
    anyhow::ensure!(fc.enable, "fc.enable=false");
    match cmd {
        FcCmd::Autodetect => {
            let res = run_fc_autodetect(fc).await?;
            if let Some((dev, baud)) = res.chosen {
                println!("CHOSEN: {} @ {}", dev, baud);
            } else {
                println!("CHOSEN: none");
            }
            for p in res.attempts {
                println!("try dev={} baud={} hb={} {}ms note={}", p.dev, p.baud, p.hb_seen, p.elapsed_ms, p.note);
            }
            Ok(())
        }
        FcCmd::Status => {
            let link = open_fc(fc).await?;
            let reader = link.spawn_reader();
            tokio::time::sleep(fc.heartbeat_timeout()).await;

            let st = link.link_status();
            println!("connected={}", st.connected);
            println!("port={:?} baud={:?}", st.port, st.baud);
            println!("last_heartbeat_age={:?}", st.hb_age());
            println!("messages_seen={}", st.messages_seen);
            println!("last_error={:?}", st.last_error);
            let bat = link.battery_status();
            println!("battery={:?}% voltage={:?}", bat.remaining, bat.voltage);
            match link.flight_status().await {
                Ok(s) => println!("motors_on={} flying={} mode={}", s.are_motors_on, s.is_flying, s.flight_mode),
                Err(e) => println!("flight_status: {}", e),
            }
            match link.is_ready_for_takeoff().await {
                Ok(r) => println!("readiness={:?} reason={}", r.level(), r.reason),
                Err(e) => println!("readiness: {}", e),
            }

            link.shutdown();
            let _ = reader.await;
            Ok(())
        }
    }
}

async fn run(cfg: &Config) -> Result<()> {
    info!("run: starting");
    session_doctor::check_session(&cfg.session)?;

    let fc_cfg = cfg.fc.as_ref().context("no [fc] config section")?;
    anyhow::ensure!(fc_cfg.enable, "fc.enable=false");
    let link = Arc::new(open_fc(fc_cfg).await?);
    let reader = link.spawn_reader();

    // let the first heartbeats land before the session reads status
    tokio::time::sleep(Duration::from_millis(500)).await;

    let session = FlightSession::start(link.clone(), link.clone(), &cfg.session)
        .await
        .context("start flight session")?;

    let mut outcomes = session.subscribe_outcomes();
    tokio::spawn(async move {
        while let Ok(outcome) = outcomes.recv().await {
            println!("mission: {:?}", outcome);
        }
    });

    println!("ready; type `help` for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("read stdin")?,
            _ = tokio::signal::ctrl_c() => {
                info!("run: interrupted");
                None
            }
        };
        let Some(line) = line else { break };
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }
        if matches!(words[0], "quit" | "exit") {
            break;
        }
        if let Err(e) = console(&session, &words).await {
            println!("error: {:#}", e);
        }
    }

    // stop the aircraft before tearing down
    session.on_stick_release(StickSide::Left).await;
    session.shutdown().await;
    link.shutdown();
    let _ = reader.await;
    info!("run: stopped");
    Ok(())
}

async fn console<F, P>(s: &FlightSession<F, P>, words: &[&str]) -> Result<()>
where
    F: FlightController + ?Sized + 'static,
    P: vstick_fc::MissionPlanner + ?Sized + 'static,
{
    match words {
        ["help"] => {
            println!("takeoff | land | cancel-land");
            println!("vs on|off");
            println!("stick left|right <dx> <dy> | release");
            println!("mission start <name> | mission pause|resume|stop");
            println!("status | log [clear] | quit");
        }
        ["takeoff"] => s.takeoff().await?,
        ["land"] => s.land().await?,
        ["cancel-land"] => s.cancel_landing().await?,
        ["vs", "on"] => s.set_manual_virtual_stick(true).await?,
        ["vs", "off"] => s.set_manual_virtual_stick(false).await?,
        ["stick", side, dx, dy] => {
            let side = match *side {
                "left" | "l" => StickSide::Left,
                "right" | "r" => StickSide::Right,
                other => anyhow::bail!("unknown stick {}", other),
            };
            let dx: f64 = dx.parse().context("dx")?;
            let dy: f64 = dy.parse().context("dy")?;
            let axes = s.on_stick_change(side, dx, dy);
            println!(
                "yaw={:+.2} throttle={:+.2} roll={:+.2} pitch={:+.2}",
                axes.yaw, axes.throttle, axes.roll, axes.pitch
            );
        }
        ["release", ..] => {
            if !s.on_stick_release(StickSide::Left).await {
                println!("warning: stop command not confirmed");
            }
        }
        ["mission", "start", name] => s.start_mission(name).await?,
        ["mission", "pause"] => s.pause_mission().await?,
        ["mission", "resume"] => s.resume_mission().await?,
        ["mission", "stop"] => s.stop_mission().await?,
        ["status"] => {
            let fs = s.flight_status();
            println!(
                "connected={} motors_on={} flying={} mode={}",
                fs.is_connected, fs.are_motors_on, fs.is_flying, fs.flight_mode
            );
            let cs = s.control_state();
            println!("mission={:?} virtual_stick={}", cs.mission, cs.virtual_stick);
            if let Some(r) = s.readiness() {
                println!("readiness={:?} ({})", r.level, r.check.reason);
            }
            if let Some(a) = s.altitude() {
                println!("altitude={:.1} m", a.altitude);
            }
            if let Some(p) = s.mission_progress() {
                println!("progress: {}", p.describe());
            }
        }
        ["log"] => {
            for e in s.log().entries_newest_first() {
                println!("{}", format_entry(&e));
            }
        }
        ["log", "clear"] => s.log().clear(),
        _ => anyhow::bail!("unknown command, try `help`"),
    }
    Ok(())
}

fn format_entry(e: &DebugLogEntry) -> String {
    let ts = time::OffsetDateTime::from_unix_timestamp_nanos(e.ts_unix_ms as i128 * 1_000_000)
        .unwrap_or(time::OffsetDateTime::UNIX_EPOCH);
    format!(
        "{:02}:{:02}:{:02}.{:03} {:<5} {}",
        ts.hour(),
        ts.minute(),
        ts.second(),
        ts.millisecond(),
        e.level.as_str(),
        e.message
    )
}

async fn run_fc_autodetect(fc: &FcConfig) -> Result<AutodetectResult> {
    let devs = fc.candidate_devs.clone().unwrap_or_else(default_candidate_devs);
    let bauds = fc.candidate_bauds.clone().unwrap_or_else(default_candidate_bauds);
    let target_sys = fc.target_sys;
    let timeout = fc.heartbeat_timeout();

    // serial probing blocks
    tokio::task::spawn_blocking(move || autodetect_fc(devs, bauds, target_sys, timeout))
        .await
        .context("autodetect task")
}

async fn resolve_fc_port(fc: &FcConfig) -> Result<(String, u32)> {
    if fc.autodetect {
        let res = run_fc_autodetect(fc).await?;
        if let Some((dev, baud)) = res.chosen {
            return Ok((dev, baud));
        }
        anyhow::bail!("fc autodetect failed: no heartbeat found");
    } else {
        let dev = fc.serial_dev.clone().context("fc.serial_dev missing (autodetect=false)")?;
        let baud = fc.baud.context("fc.baud missing (autodetect=false)")?;
        Ok((dev, baud))
    }
}

async fn open_fc(fc: &FcConfig) -> Result<MavFlightController> {
    let (dev, baud) = resolve_fc_port(fc).await?;
    MavFlightController::open(fc.link_config(dev, baud)).context("FC open")
}
