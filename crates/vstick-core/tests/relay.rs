mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MockFc, MockPlanner};
use vstick_core::{DebugLog, EventRelay, MissionController, SessionError};
use vstick_proto::{ControlMode, EventCategory, FcEvent, FlightStatus, MissionEvent, MissionOutcome, MissionState};

type Controller = MissionController<MockFc, MockPlanner>;

fn parts() -> (Arc<MockFc>, Arc<Controller>, DebugLog) {
    let fc = Arc::new(MockFc::new());
    let log = DebugLog::new(100);
    let c = Arc::new(MissionController::new(fc.clone(), Arc::new(MockPlanner::new(fc.clone())), log.clone()));
    (fc, c, log)
}

#[tokio::test]
async fn holds_one_subscription_per_category() {
    let (fc, c, log) = parts();
    let relay = EventRelay::start(fc.clone(), c, log).await.unwrap();
    assert_eq!(relay.active_subscriptions(), EventCategory::ALL.len());
    for cat in EventCategory::ALL {
        assert_eq!(fc.bus.listener_count(cat), 1, "{:?}", cat);
    }
    assert!(relay.flight_status().is_connected);
}

#[tokio::test]
async fn shutdown_revokes_everything_once() {
    let (fc, c, log) = parts();
    let relay = EventRelay::start(fc.clone(), c, log).await.unwrap();
    assert_eq!(relay.shutdown(), EventCategory::ALL.len());
    assert_eq!(fc.listeners(), 0);
    assert_eq!(relay.shutdown(), 0);
    assert_eq!(relay.active_subscriptions(), 0);
}

#[tokio::test]
async fn drop_revokes() {
    let (fc, c, log) = parts();
    let relay = EventRelay::start(fc.clone(), c, log).await.unwrap();
    drop(relay);
    assert_eq!(fc.listeners(), 0);
}

#[tokio::test]
async fn partial_subscribe_failure_releases_what_was_acquired() {
    let (fc, c, log) = parts();
    fc.fail_subscribe(EventCategory::VirtualStick);
    let err = EventRelay::start(fc.clone(), c, log.clone()).await.err().unwrap();
    assert!(matches!(err, SessionError::Setup { stage: "event subscription", .. }));
    assert_eq!(fc.listeners(), 0);
    assert!(log.entries().iter().any(|e| e.message.contains("VirtualStick")));
}

#[tokio::test]
async fn flight_status_events_update_the_cell() {
    let (fc, c, log) = parts();
    let relay = EventRelay::start(fc.clone(), c, log.clone()).await.unwrap();
    let mut rx = relay.subscribe_flight_status();

    fc.emit(FcEvent::FlightStatusChanged(FlightStatus {
        is_connected: true,
        are_motors_on: true,
        is_flying: true,
        flight_mode: "GUIDED".into(),
    }));
    let got = tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|s| s.is_flying))
        .await
        .unwrap()
        .unwrap()
        .clone();
    assert_eq!(got.flight_mode, "GUIDED");
    assert!(log.entries().iter().any(|e| e.message == "Aircraft airborne"));
}

#[tokio::test]
async fn mission_events_reach_the_controller() {
    let (fc, c, log) = parts();
    c.configure_control_mode(ControlMode::default()).await.unwrap();
    c.start("survey").await.unwrap();
    let mut outcomes = c.subscribe_outcomes();
    let _relay = EventRelay::start(fc.clone(), c.clone(), log).await.unwrap();

    fc.emit(FcEvent::Mission(MissionEvent::Completed));
    let outcome = tokio::time::timeout(Duration::from_secs(1), outcomes.recv()).await.unwrap().unwrap();
    assert_eq!(outcome, MissionOutcome::Completed);
    assert_eq!(c.state(), MissionState::Idle);
}

#[tokio::test]
async fn takeoff_result_is_logged() {
    let (fc, c, log) = parts();
    let _relay = EventRelay::start(fc.clone(), c, log.clone()).await.unwrap();
    fc.emit(FcEvent::TakeoffResult { ok: false, reason: Some("not armed".into()) });
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(log.entries().iter().any(|e| e.message == "Takeoff failed: not armed"));
}

#[tokio::test]
async fn events_after_shutdown_are_not_delivered() {
    let (fc, c, log) = parts();
    let relay = EventRelay::start(fc.clone(), c, log).await.unwrap();
    relay.shutdown();
    fc.emit(FcEvent::FlightStatusChanged(FlightStatus { is_flying: true, ..Default::default() }));
    tokio::task::yield_now().await;
    assert!(!relay.flight_status().is_flying);
}
