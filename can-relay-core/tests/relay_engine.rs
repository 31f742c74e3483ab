// Relay engine behavior against scripted buses
mod common;

use can_relay_core::{CancelToken, RelayConfig, RelayEngine, RelayRequest, RelayStatus};
use common::{sample_frames, std_frame, MockBus, MockFactory, Probe, SendMode, Step};
use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};

const POLL: Duration = Duration::from_millis(100);
// Scheduling slack on top of the one-poll bound
const SLACK: Duration = Duration::from_millis(250);

fn engine(threshold: u32) -> RelayEngine {
    RelayEngine::new(
        RelayConfig::new()
            .with_poll_timeout(POLL)
            .with_max_consecutive_send_failures(threshold),
    )
    .unwrap()
}

fn request(secs: f64) -> RelayRequest {
    RelayRequest::new("src", "dst").with_duration_secs(secs).unwrap()
}

fn cancel_after(delay: Duration) -> CancelToken {
    let token = CancelToken::new();
    let remote = token.clone();
    thread::spawn(move || {
        thread::sleep(delay);
        remote.cancel();
    });
    token
}

#[test]
fn forwards_frames_in_order_and_unmodified() {
    let src = Probe::default();
    let dst = Probe::default();
    let frames = sample_frames(40);
    let factory = MockFactory::new()
        .with_bus(MockBus::new("src", &src).with_frames(&frames))
        .with_bus(MockBus::new("dst", &dst));

    let report = engine(3).run(&factory, &request(0.3), &CancelToken::new());

    assert_eq!(report.status, RelayStatus::CompletedDuration);
    assert_eq!(dst.sent(), frames);
    assert_eq!(report.frames_received, 40);
    assert_eq!(report.frames_forwarded, 40);
    assert_eq!(report.frames_dropped, 0);
    assert_eq!(src.closes(), 1);
    assert_eq!(dst.closes(), 1);
}

#[test]
fn duration_bound_is_within_one_poll() {
    let src = Probe::default();
    let dst = Probe::default();
    let factory = MockFactory::new()
        .with_bus(MockBus::new("src", &src))
        .with_bus(MockBus::new("dst", &dst));

    let start = Instant::now();
    let report = engine(3).run(&factory, &request(0.5), &CancelToken::new());
    let elapsed = start.elapsed();

    assert_eq!(report.status, RelayStatus::CompletedDuration);
    assert!(report.running_time >= Duration::from_millis(500));
    assert!(elapsed >= Duration::from_millis(500), "stopped early: {:?}", elapsed);
    assert!(elapsed <= Duration::from_millis(500) + POLL + SLACK, "overran: {:?}", elapsed);
}

#[test]
fn cancellation_is_noticed_within_one_poll() {
    let src = Probe::default();
    let dst = Probe::default();
    let factory = MockFactory::new()
        .with_bus(MockBus::new("src", &src))
        .with_bus(MockBus::new("dst", &dst));

    let start = Instant::now();
    let cancel = cancel_after(Duration::from_millis(200));
    let report = engine(3).run(&factory, &request(0.0), &cancel);
    let elapsed = start.elapsed();

    assert_eq!(report.status, RelayStatus::CancelledByUser);
    assert!(elapsed <= Duration::from_millis(200) + POLL + SLACK, "slow: {:?}", elapsed);
    assert_eq!(src.closes(), 1);
    assert_eq!(dst.closes(), 1);
}

#[test]
fn unbounded_run_only_ends_on_cancel() {
    let src = Probe::default();
    let dst = Probe::default();
    let factory = MockFactory::new()
        .with_bus(MockBus::new("src", &src).with_frames(&sample_frames(3)))
        .with_bus(MockBus::new("dst", &dst));

    let cancel = cancel_after(Duration::from_millis(600));
    let report = engine(3).run(&factory, &RelayRequest::new("src", "dst"), &cancel);

    assert_eq!(report.status, RelayStatus::CancelledByUser);
    assert!(report.running_time >= Duration::from_millis(600));
    assert_eq!(report.frames_forwarded, 3);
}

#[test]
fn raised_flag_stops_before_first_receive() {
    let src = Probe::default();
    let dst = Probe::default();
    let factory = MockFactory::new()
        .with_bus(MockBus::new("src", &src).with_frames(&sample_frames(5)))
        .with_bus(MockBus::new("dst", &dst));

    let cancel = CancelToken::new();
    cancel.cancel();
    let report = engine(3).run(&factory, &request(10.0), &cancel);

    assert_eq!(report.status, RelayStatus::CancelledByUser);
    assert_eq!(src.receives(), 0);
    assert!(dst.sent().is_empty());
    assert_eq!(src.closes(), 1);
    assert_eq!(dst.closes(), 1);
}

#[test]
fn target_open_failure_releases_source_once() {
    let src = Probe::default();
    let factory = MockFactory::new().with_bus(MockBus::new("src", &src).with_frames(&sample_frames(5)));

    let report = engine(3).run(&factory, &request(1.0), &CancelToken::new());

    assert_eq!(report.status, RelayStatus::InterfaceUnavailable);
    assert_eq!(src.closes(), 1);
    assert_eq!(src.receives(), 0);
    assert_eq!(report.frames_forwarded, 0);
    assert!(report.last_error.unwrap().contains("dst"));
}

#[test]
fn source_open_failure_never_opens_target() {
    let dst = Probe::default();
    let factory = MockFactory::new().with_bus(MockBus::new("dst", &dst));

    let report = engine(3).run(&factory, &request(1.0), &CancelToken::new());

    assert_eq!(report.status, RelayStatus::InterfaceUnavailable);
    assert_eq!(factory.unopened(), vec!["dst".to_string()]);
    assert_eq!(dst.closes(), 0);
}

#[test]
fn dead_target_escalates_after_threshold() {
    let src = Probe::default();
    let dst = Probe::default();
    let factory = MockFactory::new()
        .with_bus(MockBus::new("src", &src).with_frames(&sample_frames(10)))
        .with_bus(MockBus::new("dst", &dst).with_send_mode(SendMode::Refuse));

    let report = engine(4).run(&factory, &request(5.0), &CancelToken::new());

    assert_eq!(report.status, RelayStatus::TargetUnreachable);
    assert_eq!(report.frames_received, 4);
    assert_eq!(report.frames_dropped, 4);
    assert_eq!(report.frames_forwarded, 0);
    assert_eq!(src.closes(), 1);
    assert_eq!(dst.closes(), 1);
}

#[test]
fn target_that_stalls_after_one_frame_becomes_unreachable() {
    let src = Probe::default();
    let dst = Probe::default();
    let frames = sample_frames(10);
    let pattern: VecDeque<bool> = [true, false, false, false].into_iter().collect();
    let factory = MockFactory::new()
        .with_bus(MockBus::new("src", &src).with_frames(&frames))
        .with_bus(MockBus::new("dst", &dst).with_send_mode(SendMode::Pattern(pattern)));

    let report = engine(3).run(&factory, &request(5.0), &CancelToken::new());

    assert_eq!(report.status, RelayStatus::TargetUnreachable);
    assert_eq!(report.frames_forwarded, 1);
    assert_eq!(report.frames_dropped, 3);
    assert_eq!(dst.sent(), vec![frames[0].clone()]);
    assert_eq!(src.closes(), 1);
}

#[test]
fn successful_send_resets_failure_count() {
    let src = Probe::default();
    let dst = Probe::default();
    let frames = sample_frames(6);
    let pattern: VecDeque<bool> = [false, false, true, false, false, true].into_iter().collect();
    let factory = MockFactory::new()
        .with_bus(MockBus::new("src", &src).with_frames(&frames))
        .with_bus(MockBus::new("dst", &dst).with_send_mode(SendMode::Pattern(pattern)));

    let report = engine(3).run(&factory, &request(0.3), &CancelToken::new());

    assert_eq!(report.status, RelayStatus::CompletedDuration);
    assert_eq!(report.frames_dropped, 4);
    assert_eq!(dst.sent(), vec![frames[2].clone(), frames[5].clone()]);
}

#[test]
fn source_failure_stops_immediately() {
    let src = Probe::default();
    let dst = Probe::default();
    let first = std_frame(0x10, &[0xAA]);
    let factory = MockFactory::new()
        .with_bus(MockBus::new("src", &src).with_script([
            Step::Frame(first.clone()),
            Step::Idle,
            Step::Fail,
            Step::Frame(std_frame(0x11, &[0xBB])),
        ]))
        .with_bus(MockBus::new("dst", &dst));

    let report = engine(3).run(&factory, &request(5.0), &CancelToken::new());

    assert_eq!(report.status, RelayStatus::SourceUnreachable);
    assert_eq!(dst.sent(), vec![first]);
    assert_eq!(src.receives(), 3);
    assert!(report.last_error.unwrap().contains("bus-off"));
    assert_eq!(src.closes(), 1);
    assert_eq!(dst.closes(), 1);
}

#[test]
fn teardown_closes_target_before_source() {
    let probe = Probe::default();
    let factory = MockFactory::new()
        .with_bus(MockBus::new("src", &probe))
        .with_bus(MockBus::new("dst", &probe));

    let report = engine(3).run(&factory, &request(0.1), &CancelToken::new());

    assert_eq!(report.status, RelayStatus::CompletedDuration);
    assert_eq!(
        *probe.close_order.lock().unwrap(),
        vec!["dst".to_string(), "src".to_string()]
    );
}
