//! End-to-end pipeline tests: synthetic frames in, register traffic out.
//!
//! Nodes are driven directly through their lifecycle methods with the
//! recording bus standing in for hardware; the scheduler loop is only
//! exercised where the test is about the loop itself.

use linetracer::camera::{FrameSource, SyntheticCamera};
use linetracer::config::Config;
use linetracer::core::Scheduler;
use linetracer::error::{TracerError, TracerResult};
use linetracer::hardware::{Pca9685, RecordingBus};
use linetracer::nodes::FollowerNode;
use linetracer::vision::Frame;
use linetracer::Node;
use std::time::Duration;

const LED0_ON_L: u8 = 0x06;
const ADDR: u8 = 0x40;

fn on_count(bus: &RecordingBus, channel: u8) -> u16 {
    let base = LED0_ON_L + 4 * channel;
    let low = bus.register(ADDR, base).unwrap_or(0) as u16;
    let high = bus.register(ADDR, base + 1).unwrap_or(0) as u16;
    (high << 8) | low
}

fn off_count(bus: &RecordingBus, channel: u8) -> u16 {
    let base = LED0_ON_L + 4 * channel;
    let low = bus.register(ADDR, base + 2).unwrap_or(0) as u16;
    let high = bus.register(ADDR, base + 3).unwrap_or(0) as u16;
    (high << 8) | low
}

fn build(camera: impl FrameSource + 'static, config: &Config) -> (RecordingBus, FollowerNode) {
    let bus = RecordingBus::new();
    let pca = Pca9685::new(Box::new(bus.clone()), ADDR).expect("device present");
    let node = FollowerNode::new(Box::new(camera), pca, config).expect("valid config");
    (bus, node)
}

#[test]
fn offset_line_steers_and_encodes_duty() {
    let camera = SyntheticCamera::new(160, 120).with_line(0.3, 0.1);
    let (bus, mut node) = build(camera, &Config::default());

    node.init().unwrap();
    node.tick().unwrap();

    let (left, right) = node.motors().speeds();
    // Line left of center, default negative output sign: left wheel
    // forward, right wheel reverse, both one slew step from zero
    assert!(left > 0.0, "left {}", left);
    assert!(right < 0.0, "right {}", right);

    // Direction pins: left forward = in1 (ch1) full-on; right reverse =
    // in2 (ch5) full-on
    assert_eq!(on_count(&bus, 1), 4096);
    assert_eq!(on_count(&bus, 2), 0);
    assert_eq!(on_count(&bus, 4), 0);
    assert_eq!(on_count(&bus, 5), 4096);

    // Duty registers carry the dead-zone-compensated magnitudes
    let expected_left = (f64::from(left.abs().max(0.21)) * 4095.0).round() as u16;
    let expected_right = (f64::from(right.abs().max(0.21)) * 4095.0).round() as u16;
    assert_eq!(off_count(&bus, 0), expected_left);
    assert_eq!(off_count(&bus, 3), expected_right);
}

#[test]
fn lineless_frames_hold_the_safety_stop() {
    let camera = SyntheticCamera::new(160, 120).with_line(0.5, 0.0);
    let (bus, mut node) = build(camera, &Config::default());

    node.init().unwrap();
    bus.clear_log();
    node.tick().unwrap();

    // Safety branch: both wheels stopped, all direction pins low
    assert_eq!(node.motors().speeds(), (0.0, 0.0));
    for channel in 0..6u8 {
        assert_eq!(on_count(&bus, channel), 0, "channel {}", channel);
        assert_eq!(off_count(&bus, channel), 0, "channel {}", channel);
    }
    // The stop is re-commanded, not skipped
    assert!(!bus.writes().is_empty());
}

#[test]
fn recovery_is_automatic_once_a_line_is_seen() {
    // Off-center line with a gap over frames 1..11
    let camera = SyntheticCamera::new(160, 120)
        .with_line(0.3, 0.1)
        .with_gap(1, 11);
    let (_bus, mut node) = build(camera, &Config::default());

    node.tick().unwrap();
    assert_ne!(node.motors().speeds(), (0.0, 0.0));

    // In the gap: slewed stop engages and holds
    for _ in 0..10 {
        node.tick().unwrap();
    }
    assert_eq!(node.motors().speeds(), (0.0, 0.0));

    // Line returns: drive resumes with no operator action
    node.tick().unwrap();
    assert_ne!(node.motors().speeds(), (0.0, 0.0));
}

struct FailingCamera {
    reads_before_failure: u32,
    inner: SyntheticCamera,
}

impl FrameSource for FailingCamera {
    fn read(&mut self) -> TracerResult<Frame> {
        if self.reads_before_failure == 0 {
            return Err(TracerError::capture("device disappeared"));
        }
        self.reads_before_failure -= 1;
        self.inner.read()
    }

    fn close(&mut self) {}
}

#[test]
fn frame_acquisition_failure_is_fatal() {
    let camera = FailingCamera {
        reads_before_failure: 2,
        inner: SyntheticCamera::new(160, 120).with_line(0.5, 0.1),
    };
    let (_bus, mut node) = build(camera, &Config::default());

    node.tick().unwrap();
    node.tick().unwrap();
    let result = node.tick();
    assert!(matches!(result, Err(TracerError::Capture(_))));
}

#[test]
fn shutdown_zeroes_every_channel() {
    let camera = SyntheticCamera::new(160, 120).with_line(0.2, 0.1);
    let (bus, mut node) = build(camera, &Config::default());

    // Drive hard for a few ticks
    for _ in 0..5 {
        node.tick().unwrap();
    }
    assert_ne!(node.motors().speeds(), (0.0, 0.0));

    node.shutdown().unwrap();
    for channel in 0..16u8 {
        assert_eq!(on_count(&bus, channel), 0, "channel {}", channel);
        assert_eq!(off_count(&bus, channel), 0, "channel {}", channel);
    }
    assert_eq!(node.motors().pca().fault_count(), 0);
}

#[test]
fn scheduler_runs_the_loop_and_cleans_up() {
    let camera = SyntheticCamera::new(160, 120).with_line(0.5, 0.1).with_sway(0.2);
    let config = Config::default();
    let (bus, node) = build(camera, &config);

    let mut scheduler = Scheduler::new();
    scheduler.add(node).order(0).rate_hz(100.0).done();
    scheduler
        .run_for(Duration::from_millis(150))
        .expect("clean run");

    // Guaranteed cleanup left no channel driven
    for channel in 0..16u8 {
        assert_eq!(on_count(&bus, channel), 0);
        assert_eq!(off_count(&bus, channel), 0);
    }
}

#[test]
fn scheduler_shuts_down_after_capture_failure() {
    let camera = FailingCamera {
        reads_before_failure: 3,
        inner: SyntheticCamera::new(160, 120).with_line(0.5, 0.1),
    };
    let (bus, node) = build(camera, &Config::default());

    let mut scheduler = Scheduler::new();
    scheduler.add(node).order(0).rate_hz(200.0).done();
    let result = scheduler.run_for(Duration::from_secs(5));
    assert!(result.is_err(), "capture failure must surface");

    // Even the fatal path ends with zeroed hardware
    for channel in 0..16u8 {
        assert_eq!(on_count(&bus, channel), 0);
        assert_eq!(off_count(&bus, channel), 0);
    }
}

#[test]
fn bus_faults_do_not_stop_the_loop() {
    let camera = SyntheticCamera::new(160, 120).with_line(0.3, 0.1);
    let (bus, mut node) = build(camera, &Config::default());

    bus.set_fail_writes(true);
    node.tick().unwrap();
    node.tick().unwrap();
    assert!(node.motors().pca().fault_count() > 0);

    // Bus recovers; commands flow again. With the derivative term
    // settled the steering stays left: the right wheel keeps reversing,
    // so its in2 channel is driven high and its duty is non-zero.
    bus.set_fail_writes(false);
    node.tick().unwrap();
    assert_eq!(on_count(&bus, 5), 4096);
    assert!(off_count(&bus, 3) > 0);
}
