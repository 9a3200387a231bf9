//! Line detection: ROI -> binary mask -> centroid -> lateral error.

use crate::config::VisionConfig;
use crate::vision::ops;
use crate::vision::Frame;
use ndarray::Array2;

/// Outcome of one detection pass.
///
/// `NotFound` is distinct from a detected line sitting at zero error —
/// callers gate safety behavior on the variant, not on a sentinel value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineObservation {
    Detected {
        /// Lateral offset of the line centroid, roughly -1 (left edge)
        /// to +1 (right edge); 0 is centered
        error: f32,
        /// Fraction of the analyzed area classified as line, 0 to 1
        confidence: f32,
        /// Centroid in ROI pixel coordinates (x, y)
        centroid: (f32, f32),
    },
    NotFound,
}

impl LineObservation {
    pub fn is_detected(&self) -> bool {
        matches!(self, LineObservation::Detected { .. })
    }
}

/// Diagnostic overlay: the ROI with a center reference line and, when a
/// line was found, a centroid marker. The textual readout rides along as
/// a caption. Purely diagnostic — nothing downstream reads it.
#[derive(Debug, Clone)]
pub struct DebugView {
    pub frame: Frame,
    pub caption: String,
}

/// Everything one detection pass produces.
#[derive(Debug, Clone)]
pub struct Perception {
    pub observation: LineObservation,
    /// Post-morphology binary mask ({0, 255}), ROI-sized
    pub mask: Array2<u8>,
    pub debug: DebugView,
}

/// Converts a frame into a lateral error and confidence score.
///
/// Pipeline: ROI crop -> luminance -> 5x5 Gaussian -> binarize (polarity
/// per config) -> morphological open + close (5x5) -> centroid from raw
/// moments.
pub struct LineDetector {
    config: VisionConfig,
}

impl LineDetector {
    pub fn new(config: &VisionConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn process(&self, frame: &Frame) -> Perception {
        let width = frame.width as usize;
        let height = frame.height as usize;
        let y0 = (height as f64 * self.config.roi_y_start) as usize;
        let y1 = ((height as f64 * self.config.roi_y_end) as usize).min(height);

        if width == 0 || y1 <= y0 {
            // Degenerate ROI: report nothing found rather than erroring
            return Perception {
                observation: LineObservation::NotFound,
                mask: Array2::zeros((0, 0)),
                debug: DebugView {
                    frame: Frame::filled(0, 0, [0, 0, 0]),
                    caption: "empty ROI".to_string(),
                },
            };
        }

        let gray = ops::luminance(frame, y0, y1);
        let smoothed = ops::gaussian_blur_5(&gray);
        let binary = ops::threshold(&smoothed, self.config.threshold, self.config.invert);
        let mask = ops::close_5(&ops::open_5(&binary));

        let m = ops::moments(&mask);
        let observation = if m.m00 > 0.0 {
            let cx = m.m10 / m.m00;
            let cy = m.m01 / m.m00;
            let half_width = width as f64 / 2.0;
            let error = ((cx - half_width) / half_width) as f32;
            let area = (width * (y1 - y0)) as f64;
            let confidence = (m.m00 / (255.0 * area)) as f32;
            LineObservation::Detected {
                error,
                confidence,
                centroid: (cx as f32, cy as f32),
            }
        } else {
            LineObservation::NotFound
        };

        let debug = render_debug(frame, y0, y1, &observation);

        Perception {
            observation,
            mask,
            debug,
        }
    }
}

fn render_debug(frame: &Frame, y0: usize, y1: usize, observation: &LineObservation) -> DebugView {
    const CENTER_GREEN: [u8; 3] = [0, 255, 0];
    const MARKER_RED: [u8; 3] = [255, 0, 0];

    let width = frame.width;
    let roi_height = (y1 - y0) as u32;

    // Copy the ROI rows
    let mut overlay = Frame::filled(width, roi_height, [0, 0, 0]);
    for y in 0..roi_height {
        for x in 0..width {
            overlay.set_pixel(x, y, frame.pixel(x, y0 as u32 + y));
        }
    }

    // Reference line at the horizontal center
    let center_x = width / 2;
    for y in 0..roi_height {
        overlay.set_pixel(center_x.min(width - 1), y, CENTER_GREEN);
    }

    let caption = match observation {
        LineObservation::Detected {
            error,
            confidence,
            centroid,
        } => {
            // Filled disc at the centroid
            let (cx, cy) = (centroid.0.round() as i64, centroid.1.round() as i64);
            for dy in -5i64..=5 {
                for dx in -5i64..=5 {
                    if dx * dx + dy * dy > 25 {
                        continue;
                    }
                    let (x, y) = (cx + dx, cy + dy);
                    if x >= 0 && (x as u32) < width && y >= 0 && (y as u32) < roi_height {
                        overlay.set_pixel(x as u32, y as u32, MARKER_RED);
                    }
                }
            }
            format!("Err: {:+.2} | Conf: {:.2}", error, confidence)
        }
        LineObservation::NotFound => "no line detected".to_string(),
    };

    DebugView {
        frame: overlay,
        caption,
    }
}
