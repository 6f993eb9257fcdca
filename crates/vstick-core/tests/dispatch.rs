mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;

use common::{axes, Call, MockFc};
use vstick_core::{DebugLog, DispatchLimiter};
use vstick_proto::{LogLevel, StickAxes};

const INTERVAL: Duration = Duration::from_millis(50);

fn limiter(gate: bool) -> (Arc<MockFc>, Arc<DispatchLimiter<MockFc>>, watch::Sender<bool>, DebugLog) {
    let fc = Arc::new(MockFc::new());
    let (gate_tx, gate_rx) = watch::channel(gate);
    let log = DebugLog::new(50);
    let d = DispatchLimiter::new(fc.clone(), gate_rx, INTERVAL, log.clone());
    d.spawn();
    (fc, d, gate_tx, log)
}

#[tokio::test(start_paused = true)]
async fn burst_collapses_to_latest() {
    let (fc, d, _gate, _) = limiter(true);
    for i in 0..10 {
        d.on_input_change(axes(0.0, 0.0, i as f64 / 10.0, 0.0));
    }
    sleep(Duration::from_millis(200)).await;
    assert_eq!(fc.sticks(), vec![axes(0.0, 0.0, 0.9, 0.0)]);
}

#[tokio::test(start_paused = true)]
async fn sends_are_spaced_and_intermediate_values_dropped() {
    let (fc, d, _gate, _) = limiter(true);
    let a = axes(0.1, 0.0, 0.0, 0.0);
    let b = axes(0.2, 0.0, 0.0, 0.0);
    let c = axes(0.3, 0.0, 0.0, 0.0);

    d.on_input_change(a);
    sleep(Duration::from_millis(10)).await;
    d.on_input_change(b);
    sleep(Duration::from_millis(10)).await;
    d.on_input_change(c);
    sleep(Duration::from_millis(200)).await;

    assert_eq!(fc.sticks(), vec![a, c]);

    let times: Vec<_> = fc
        .timed_calls()
        .into_iter()
        .filter(|(_, c)| matches!(c, Call::Stick(_)))
        .map(|(t, _)| t)
        .collect();
    for w in times.windows(2) {
        assert!(w[1] - w[0] >= INTERVAL, "spacing {:?}", w[1] - w[0]);
    }
}

#[tokio::test(start_paused = true)]
async fn repeated_value_is_not_resent() {
    let (fc, d, _gate, _) = limiter(true);
    let a = axes(0.0, 0.5, 0.0, 0.0);
    d.on_input_change(a);
    sleep(Duration::from_millis(100)).await;
    d.on_input_change(a);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(fc.sticks(), vec![a]);
}

#[tokio::test(start_paused = true)]
async fn closed_gate_drops_changes() {
    let (fc, d, gate, _) = limiter(false);
    d.on_input_change(axes(1.0, 0.0, 0.0, 0.0));
    sleep(Duration::from_millis(100)).await;
    assert!(fc.sticks().is_empty());

    gate.send(true).unwrap();
    let b = axes(0.0, 0.0, 0.0, 1.0);
    d.on_input_change(b);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(fc.sticks(), vec![b]);
}

#[tokio::test(start_paused = true)]
async fn gate_closing_discards_pending() {
    let (fc, d, gate, _) = limiter(true);
    let a = axes(0.4, 0.0, 0.0, 0.0);
    d.on_input_change(a);
    sleep(Duration::from_millis(10)).await;
    d.on_input_change(axes(0.5, 0.0, 0.0, 0.0));
    gate.send(false).unwrap();
    sleep(Duration::from_millis(200)).await;
    assert_eq!(fc.sticks(), vec![a]);
}

#[tokio::test(start_paused = true)]
async fn release_sends_zero_at_once_and_clears_pending() {
    let (fc, d, _gate, _) = limiter(true);
    d.on_input_change(axes(0.0, 0.0, 0.7, 0.7));
    assert!(d.on_input_release().await);
    sleep(Duration::from_millis(200)).await;
    assert_eq!(fc.sticks(), vec![StickAxes::ZERO]);
}

#[tokio::test(start_paused = true)]
async fn release_ignores_pacing_and_gate() {
    let (fc, d, gate, _) = limiter(true);
    let a = axes(0.2, 0.2, 0.0, 0.0);
    d.on_input_change(a);
    sleep(Duration::from_millis(1)).await;
    gate.send(false).unwrap();

    let before = tokio::time::Instant::now();
    assert!(d.on_input_release().await);
    assert_eq!(tokio::time::Instant::now(), before);
    assert_eq!(fc.sticks(), vec![a, StickAxes::ZERO]);
}

#[tokio::test(start_paused = true)]
async fn release_retries_once() {
    let (fc, d, _gate, log) = limiter(true);
    fc.fail("send_stick_command", 1);
    assert!(d.on_input_release().await);
    assert_eq!(fc.sticks(), vec![StickAxes::ZERO, StickAxes::ZERO]);
    assert!(log.entries().iter().any(|e| e.level == LogLevel::Warn));
}

#[tokio::test(start_paused = true)]
async fn release_failure_after_retry_is_logged() {
    let (fc, d, _gate, log) = limiter(true);
    fc.fail("send_stick_command", 2);
    assert!(!d.on_input_release().await);
    assert_eq!(fc.sticks().len(), 2);
    let last = log.entries_newest_first().remove(0);
    assert_eq!(last.level, LogLevel::Error);
    assert!(last.message.contains("after retry"));
}

#[tokio::test(start_paused = true)]
async fn stick_failure_does_not_stop_the_worker() {
    let (fc, d, _gate, _) = limiter(true);
    fc.fail("send_stick_command", 1);
    let a = axes(0.1, 0.0, 0.0, 0.0);
    let b = axes(0.2, 0.0, 0.0, 0.0);
    d.on_input_change(a);
    sleep(Duration::from_millis(100)).await;
    d.on_input_change(b);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(fc.sticks(), vec![a, b]);
}

#[tokio::test(start_paused = true)]
async fn closed_limiter_still_releases() {
    let (fc, d, _gate, _) = limiter(true);
    d.close();
    assert!(d.is_closed());
    d.on_input_change(axes(1.0, 1.0, 1.0, 1.0));
    sleep(Duration::from_millis(100)).await;
    assert!(fc.sticks().is_empty());
    assert!(d.on_input_release().await);
    assert_eq!(fc.sticks(), vec![StickAxes::ZERO]);
}

#[tokio::test(start_paused = true)]
async fn release_lands_after_a_command_already_on_the_wire() {
    let (fc, d, _gate, _) = limiter(true);
    fc.delay("send_stick_command", Duration::from_millis(30));
    let a = axes(0.0, 0.0, 0.0, 0.9);
    d.on_input_change(a);
    sleep(Duration::from_millis(1)).await;

    assert!(d.on_input_release().await);
    sleep(Duration::from_millis(200)).await;
    assert_eq!(fc.landed_sticks(), vec![a, StickAxes::ZERO]);
}

#[tokio::test(start_paused = true)]
async fn value_taken_before_a_release_is_never_sent() {
    let (fc, d, _gate, _) = limiter(true);
    fc.delay("send_stick_command", Duration::from_millis(100));

    // the first release holds the wire; the worker waits out pacing, takes
    // `b` and queues behind it
    let first = tokio::spawn({
        let d = d.clone();
        async move { d.on_input_release().await }
    });
    sleep(Duration::from_millis(1)).await;
    let b = axes(0.6, 0.0, 0.0, 0.0);
    d.on_input_change(b);
    sleep(Duration::from_millis(59)).await;

    assert!(d.on_input_release().await);
    assert!(first.await.unwrap());
    sleep(Duration::from_millis(200)).await;
    assert!(!fc.sticks().contains(&b));
    assert_eq!(fc.landed_sticks(), vec![StickAxes::ZERO, StickAxes::ZERO]);
}

#[tokio::test(start_paused = true)]
async fn failed_send_does_not_suppress_the_same_value() {
    let (fc, d, _gate, _) = limiter(true);
    fc.fail("send_stick_command", 1);
    let a = axes(0.0, 0.3, 0.0, 0.0);
    d.on_input_change(a);
    sleep(Duration::from_millis(100)).await;
    d.on_input_change(a);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(fc.sticks(), vec![a, a]);
    assert_eq!(fc.landed_sticks(), vec![a]);
}

#[tokio::test(start_paused = true)]
async fn same_value_is_resent_after_the_gate_reopens() {
    let (fc, d, gate, _) = limiter(true);
    let a = axes(0.0, 0.0, 0.5, 0.0);
    d.on_input_change(a);
    sleep(Duration::from_millis(100)).await;

    gate.send(false).unwrap();
    sleep(Duration::from_millis(10)).await;
    gate.send(true).unwrap();
    d.on_input_change(a);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(fc.sticks(), vec![a, a]);
}
