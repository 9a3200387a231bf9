//! Discrete PD steering law.

use crate::config::ControlConfig;

/// Per-wheel speed commands, each in [-1, 1] before the output sign.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelCommand {
    pub left: f32,
    pub right: f32,
}

/// Maps a lateral error to a differential steering pair.
///
/// `steer = kp * error + kd * (error - prev_error)`, saturated at
/// `steer_limit`, then split around `base_speed` and clamped to [-1, 1].
/// `output_sign` applies the wiring polarity in one place.
///
/// The single piece of state is `prev_error`; it is updated on every
/// `step` call, even when the caller discards the output, because it
/// defines the discrete derivative of the next call. It resets only by
/// reconstruction.
pub struct SteeringController {
    kp: f32,
    kd: f32,
    base_speed: f32,
    steer_limit: f32,
    output_sign: f32,
    prev_error: f32,
}

impl SteeringController {
    pub fn new(config: &ControlConfig) -> Self {
        Self {
            kp: config.kp,
            kd: config.kd,
            base_speed: config.base_speed,
            steer_limit: config.steer_limit,
            output_sign: config.output_sign,
            prev_error: 0.0,
        }
    }

    pub fn prev_error(&self) -> f32 {
        self.prev_error
    }

    /// One control step.
    pub fn step(&mut self, error: f32) -> WheelCommand {
        let d_error = error - self.prev_error;
        let steer = self.kp * error + self.kd * d_error;
        self.prev_error = error;

        let steer = steer.clamp(-self.steer_limit, self.steer_limit);
        let left = (self.base_speed + steer).clamp(-1.0, 1.0);
        let right = (self.base_speed - steer).clamp(-1.0, 1.0);

        WheelCommand {
            left: self.output_sign * left,
            right: self.output_sign * right,
        }
    }
}
