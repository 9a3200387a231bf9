//! Frame acquisition.
//!
//! [`FrameSource`] is the collaborator surface for capture devices: one
//! blocking read per control iteration, an error meaning the device is
//! gone (fatal to the loop). [`SyntheticCamera`] renders frames in
//! software for bring-up and testing; real capture backends plug in
//! behind the same trait.

use crate::config::CameraConfig;
use crate::error::TracerResult;
use crate::vision::Frame;

/// A source of frames, one per control iteration.
pub trait FrameSource: Send {
    /// Acquire the next frame. Blocking. An `Err` is a frame-acquisition
    /// failure and terminates the control loop.
    fn read(&mut self) -> TracerResult<Frame>;

    /// Release the device. Idempotent.
    fn close(&mut self);
}

/// Software frame generator: a dark vertical line on a light background,
/// optionally swaying sinusoidally so the controller has something to
/// chase.
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    frame_count: u64,
    line_center: f64,
    line_width: f64,
    sway: f64,
    gap: Option<(u64, u64)>,
    background: u8,
    line_level: u8,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_count: 0,
            line_center: 0.5,
            line_width: 0.08,
            sway: 0.0,
            gap: None,
            background: 200,
            line_level: 30,
        }
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        Self::new(config.width, config.height)
    }

    /// Place the line: center and width as fractions of the frame width.
    /// A zero width produces lineless frames.
    pub fn with_line(mut self, center: f64, width: f64) -> Self {
        self.line_center = center.clamp(0.0, 1.0);
        self.line_width = width.clamp(0.0, 1.0);
        self
    }

    /// Sway amplitude as a fraction of the frame width (one cycle every
    /// 120 frames).
    pub fn with_sway(mut self, amplitude: f64) -> Self {
        self.sway = amplitude;
        self
    }

    /// A gap in the line: frames `start..end` render without it.
    pub fn with_gap(mut self, start: u64, end: u64) -> Self {
        self.gap = Some((start, end));
        self
    }

    fn render(&self) -> Frame {
        let mut frame = Frame::filled(
            self.width,
            self.height,
            [self.background, self.background, self.background],
        );
        let in_gap = self
            .gap
            .is_some_and(|(start, end)| (start..end).contains(&self.frame_count));
        if self.line_width > 0.0 && !in_gap {
            let phase = self.frame_count as f64 / 120.0 * std::f64::consts::TAU;
            let center =
                (self.line_center + self.sway * phase.sin()).clamp(0.0, 1.0) * self.width as f64;
            let half = self.line_width * self.width as f64 / 2.0;
            let x0 = ((center - half).floor().max(0.0)) as u32;
            let x1 = ((center + half).ceil().min(self.width as f64)) as u32;
            let dark = [self.line_level, self.line_level, self.line_level];
            for y in 0..self.height {
                for x in x0..x1 {
                    frame.set_pixel(x, y, dark);
                }
            }
        }
        frame
    }
}

impl FrameSource for SyntheticCamera {
    fn read(&mut self) -> TracerResult<Frame> {
        let frame = self.render();
        self.frame_count += 1;
        Ok(frame)
    }

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_line_band() {
        let mut cam = SyntheticCamera::new(100, 10).with_line(0.5, 0.1);
        let frame = cam.read().unwrap();
        // Center column is dark, edges are light
        assert!(frame.pixel(50, 5)[0] < 100);
        assert!(frame.pixel(5, 5)[0] > 100);
        assert!(frame.pixel(95, 5)[0] > 100);
    }

    #[test]
    fn zero_width_means_no_line() {
        let mut cam = SyntheticCamera::new(64, 8).with_line(0.5, 0.0);
        let frame = cam.read().unwrap();
        for x in 0..64 {
            assert_eq!(frame.pixel(x, 4)[0], 200);
        }
    }
}
