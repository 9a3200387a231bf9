//! Background obstacle ranging.
//!
//! A sweep sensor (e.g. a spinning laser ranger) is sampled on its own
//! thread; each sweep is reduced to the minimum distance inside the
//! frontal window and published through a lock-free snapshot cell.
//! Readers never block and never see a torn value. This utility is not
//! wired into the control loop; consumers poll [`RangeMonitor::front_distance_mm`].

use crate::error::TracerResult;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// One sample of a sweep: angle 0-360 degrees, distance in millimeters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeReading {
    pub angle_deg: f32,
    pub distance_mm: f32,
}

/// A sweep-producing range sensor.
///
/// The device driver behind this trait is an external collaborator; the
/// simulated backend below serves tests and hardware-free runs.
pub trait RangeSensor: Send {
    /// Block until a full sweep is available.
    fn next_sweep(&mut self) -> TracerResult<Vec<RangeReading>>;

    /// Release the device. Called once from the sampling thread on exit.
    fn stop(&mut self);
}

/// Distance reported when nothing has been seen (or nothing is in range).
pub const NO_OBSTACLE_MM: f32 = 9999.0;

/// Single-writer snapshot cell: a sweep sequence number in the high half,
/// the f32 distance bits in the low half, updated in one atomic store.
pub struct DistanceCell(AtomicU64);

impl DistanceCell {
    fn new() -> Self {
        Self(AtomicU64::new(NO_OBSTACLE_MM.to_bits() as u64))
    }

    fn publish(&self, distance_mm: f32) {
        let seq = (self.0.load(Ordering::Relaxed) >> 32).wrapping_add(1);
        self.0
            .store(seq << 32 | distance_mm.to_bits() as u64, Ordering::Release);
    }

    pub fn distance_mm(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire) as u32)
    }

    /// How many sweeps have been published.
    pub fn sample_count(&self) -> u64 {
        self.0.load(Ordering::Acquire) >> 32
    }
}

/// Minimum valid distance inside the frontal window (`angle < window` or
/// `angle > 360 - window`); readings at or below zero are discarded.
fn min_front_distance(sweep: &[RangeReading], window_deg: f32) -> f32 {
    let mut min = NO_OBSTACLE_MM;
    for reading in sweep {
        if reading.distance_mm <= 0.0 {
            continue;
        }
        let frontal =
            reading.angle_deg < window_deg || reading.angle_deg > 360.0 - window_deg;
        if frontal && reading.distance_mm < min {
            min = reading.distance_mm;
        }
    }
    min
}

/// Owns the sampling thread and the snapshot cell.
pub struct RangeMonitor {
    cell: Arc<DistanceCell>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl RangeMonitor {
    /// Spawn the sampling thread. Sensor errors are logged and retried
    /// after a backoff; the cell keeps its last published value in the
    /// meantime.
    pub fn start(mut sensor: Box<dyn RangeSensor>, front_window_deg: f32) -> Self {
        let cell = Arc::new(DistanceCell::new());
        let running = Arc::new(AtomicBool::new(true));

        let thread_cell = cell.clone();
        let thread_running = running.clone();
        let handle = std::thread::spawn(move || {
            crate::core::log::set_node_context("ranging");
            while thread_running.load(Ordering::SeqCst) {
                match sensor.next_sweep() {
                    Ok(sweep) => {
                        thread_cell.publish(min_front_distance(&sweep, front_window_deg));
                    }
                    Err(e) => {
                        crate::tlog!(warn, "sweep failed: {}", e);
                        std::thread::sleep(Duration::from_secs(1));
                    }
                }
            }
            sensor.stop();
            crate::core::log::clear_node_context();
        });

        Self {
            cell,
            running,
            handle: Some(handle),
        }
    }

    /// Latest frontal minimum distance; never blocks.
    pub fn front_distance_mm(&self) -> f32 {
        self.cell.distance_mm()
    }

    pub fn sample_count(&self) -> u64 {
        self.cell.sample_count()
    }

    /// Signal the sampling thread and wait for it to release the device.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RangeMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Fixed-pattern sweep generator for tests and hardware-free runs.
pub struct SimulatedRangeSensor {
    /// Distance reported straight ahead, millimeters
    pub front_mm: f32,
    sweep_period: Duration,
}

impl SimulatedRangeSensor {
    pub fn new(front_mm: f32) -> Self {
        Self {
            front_mm,
            sweep_period: Duration::from_millis(10),
        }
    }
}

impl RangeSensor for SimulatedRangeSensor {
    fn next_sweep(&mut self) -> TracerResult<Vec<RangeReading>> {
        std::thread::sleep(self.sweep_period);
        // A coarse 10-degree sweep: near reading ahead, far elsewhere
        let sweep = (0..36)
            .map(|i| {
                let angle_deg = i as f32 * 10.0;
                let frontal = !(30.0..=330.0).contains(&angle_deg);
                RangeReading {
                    angle_deg,
                    distance_mm: if frontal { self.front_mm } else { 4000.0 },
                }
            })
            .collect();
        Ok(sweep)
    }

    fn stop(&mut self) {}
}
