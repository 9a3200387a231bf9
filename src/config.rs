//! Typed run configuration.
//!
//! All tunables — camera geometry, vision thresholds, PD gains, actuator
//! limits and the PWM expander wiring — live in one [`Config`] struct,
//! loaded once at startup from a TOML file (or built from defaults) and
//! treated as immutable for the lifetime of the process. Components take
//! the section they need by reference at construction time; there is no
//! global configuration state.

use crate::error::{TracerError, TracerResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete run configuration, one section per subsystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub camera: CameraConfig,
    pub vision: VisionConfig,
    pub control: ControlConfig,
    pub motor: MotorConfig,
    pub pwm: PwmConfig,
    pub ranging: RangingConfig,
}

/// Capture device settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Capture device index (0 for the default camera)
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: 640,
            height: 480,
            fps: 30.0,
        }
    }
}

/// Line detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Top of the analyzed window as a fraction of frame height (0 = top)
    pub roi_y_start: f64,
    /// Bottom of the analyzed window as a fraction of frame height (1 = bottom)
    pub roi_y_end: f64,
    /// Binarization threshold, 0-255. Adjust for lighting.
    pub threshold: u8,
    /// true: line darker than background (mask = luminance <= threshold)
    pub invert: bool,
    /// Detections below this confidence trigger the safety stop
    pub min_confidence: f32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            roi_y_start: 0.0,
            roi_y_end: 1.0,
            threshold: 80,
            invert: true,
            min_confidence: 0.0,
        }
    }
}

/// PD steering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Control loop rate in Hz
    pub control_hz: f64,
    /// Forward speed both wheels share before the steering term is applied
    pub base_speed: f32,
    /// Proportional gain
    pub kp: f32,
    /// Derivative gain
    pub kd: f32,
    /// Steering term saturation, applied before the differential split
    pub steer_limit: f32,
    /// Polarity of the final wheel commands. The sign of (gains, direction
    /// pins, output) is one calibrated unit per wiring harness; flip this
    /// rather than rewiring or negating gains.
    pub output_sign: f32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            control_hz: 30.0,
            base_speed: 0.2,
            kp: 0.23,
            kd: 1.5,
            steer_limit: 0.5,
            output_sign: -1.0,
        }
    }
}

/// PWM expander channel assignment for one wheel (H-bridge: enable + 2 direction).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WheelChannels {
    /// Channel wired to the H-bridge enable input (PWM)
    pub pwm: u8,
    /// Direction input 1
    pub in1: u8,
    /// Direction input 2
    pub in2: u8,
}

/// Actuator limits and wiring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorConfig {
    /// Max speed change per control update; <= 0 disables smoothing
    pub slew_rate: f32,
    /// Hardware safety ceiling on wheel speed, independent of the controller range
    pub speed_limit: f32,
    /// Speeds below this magnitude are treated as a stop
    pub stop_eps: f32,
    /// Minimum duty whenever motion is commanded (static friction compensation)
    pub min_power: f32,
    pub left: WheelChannels,
    pub right: WheelChannels,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            slew_rate: 0.3,
            speed_limit: 0.8,
            stop_eps: 0.05,
            min_power: 0.21,
            left: WheelChannels {
                pwm: 0,
                in1: 1,
                in2: 2,
            },
            right: WheelChannels {
                pwm: 3,
                in1: 4,
                in2: 5,
            },
        }
    }
}

/// PWM expander bus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PwmConfig {
    /// 7-bit I2C address of the expander
    pub address: u8,
    /// I2C bus number; unset means probe /dev/i2c-* for the device
    pub bus: Option<u8>,
    /// Output frequency in Hz (200 suits common H-bridge drivers)
    pub frequency_hz: f64,
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self {
            address: 0x40,
            bus: None,
            frequency_hz: 200.0,
        }
    }
}

/// Optional obstacle-ranging sampler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RangingConfig {
    pub enabled: bool,
    pub port: String,
    /// Half-width of the frontal window in degrees
    pub front_window_deg: f32,
}

impl Default for RangingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: "/dev/ttyUSB0".to_string(),
            front_window_deg: 30.0,
        }
    }
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> TracerResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Config = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants that serde cannot express.
    pub fn validate(&self) -> TracerResult<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(TracerError::config("camera resolution must be non-zero"));
        }
        if self.camera.fps <= 0.0 {
            return Err(TracerError::config("camera fps must be positive"));
        }
        let (ys, ye) = (self.vision.roi_y_start, self.vision.roi_y_end);
        if !(0.0..=1.0).contains(&ys) || !(0.0..=1.0).contains(&ye) || ys > ye {
            return Err(TracerError::config(format!(
                "ROI ratios must satisfy 0 <= start <= end <= 1 (got {} .. {})",
                ys, ye
            )));
        }
        if !(0.0..=1.0).contains(&self.vision.min_confidence) {
            return Err(TracerError::config("min_confidence must be in [0, 1]"));
        }
        if self.control.control_hz <= 0.0 {
            return Err(TracerError::config("control_hz must be positive"));
        }
        for (name, v) in [
            ("kp", self.control.kp),
            ("kd", self.control.kd),
            ("base_speed", self.control.base_speed),
            ("steer_limit", self.control.steer_limit),
        ] {
            if !v.is_finite() {
                return Err(TracerError::config(format!("{} must be finite", name)));
            }
        }
        if self.control.output_sign != 1.0 && self.control.output_sign != -1.0 {
            return Err(TracerError::config("output_sign must be 1.0 or -1.0"));
        }
        if self.control.steer_limit < 0.0 {
            return Err(TracerError::config("steer_limit must be non-negative"));
        }
        if !(0.0..=1.0).contains(&self.motor.speed_limit) {
            return Err(TracerError::config("speed_limit must be in [0, 1]"));
        }
        if self.motor.stop_eps < 0.0 || self.motor.min_power < 0.0 {
            return Err(TracerError::config(
                "stop_eps and min_power must be non-negative",
            ));
        }
        let channels = [
            self.motor.left.pwm,
            self.motor.left.in1,
            self.motor.left.in2,
            self.motor.right.pwm,
            self.motor.right.in1,
            self.motor.right.in2,
        ];
        for &ch in &channels {
            if ch > 15 {
                return Err(TracerError::config(format!(
                    "PWM channel {} out of range (0-15)",
                    ch
                )));
            }
        }
        for i in 0..channels.len() {
            for j in (i + 1)..channels.len() {
                if channels[i] == channels[j] {
                    return Err(TracerError::config(format!(
                        "PWM channel {} assigned twice",
                        channels[i]
                    )));
                }
            }
        }
        if self.pwm.address > 0x77 {
            return Err(TracerError::config("I2C address out of 7-bit range"));
        }
        if self.pwm.frequency_hz <= 0.0 {
            return Err(TracerError::config("PWM frequency must be positive"));
        }
        Ok(())
    }
}
