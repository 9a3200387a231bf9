//! Two-wheel differential drive over the PWM expander.

pub mod wheel;

pub use wheel::WheelActuator;

use crate::config::MotorConfig;
use crate::hardware::Pca9685;

/// Left + right wheel pair sharing one PWM expander.
pub struct MotorDriver {
    pca: Pca9685,
    left: WheelActuator,
    right: WheelActuator,
}

impl MotorDriver {
    pub fn new(pca: Pca9685, config: &MotorConfig) -> Self {
        Self {
            pca,
            left: WheelActuator::new(config.left, config),
            right: WheelActuator::new(config.right, config),
        }
    }

    /// Command both wheels; each applies its own slew and dead-zone
    /// compensation independently.
    pub fn set(&mut self, left_speed: f32, right_speed: f32) {
        self.left.set_target(&mut self.pca, left_speed);
        self.right.set_target(&mut self.pca, right_speed);
    }

    /// Stop both wheels through the same slewed path — deceleration is
    /// rate-limited too, unless slew is disabled.
    pub fn stop(&mut self) {
        self.set(0.0, 0.0);
    }

    /// Settled speeds after the last command, (left, right).
    pub fn speeds(&self) -> (f32, f32) {
        (self.left.current_speed(), self.right.current_speed())
    }

    pub fn pca(&self) -> &Pca9685 {
        &self.pca
    }

    pub fn pca_mut(&mut self) -> &mut Pca9685 {
        &mut self.pca
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::i2c::RecordingBus;

    #[test]
    fn wheels_are_independent() {
        let bus = RecordingBus::new();
        let pca = Pca9685::new(Box::new(bus.clone()), 0x40).unwrap();
        let config = MotorConfig {
            slew_rate: 0.0,
            ..MotorConfig::default()
        };
        let mut motors = MotorDriver::new(pca, &config);

        motors.set(0.5, -0.3);
        assert_eq!(motors.speeds(), (0.5, -0.3));

        // Left forward: channel 1 high; right reverse: channel 5 high
        assert_eq!(bus.register(0x40, 0x06 + 4 + 1), Some(0x10));
        assert_eq!(bus.register(0x40, 0x06 + 4 * 5 + 1), Some(0x10));
    }

    #[test]
    fn stop_goes_through_slew() {
        let bus = RecordingBus::new();
        let pca = Pca9685::new(Box::new(bus.clone()), 0x40).unwrap();
        let mut motors = MotorDriver::new(pca, &MotorConfig::default());

        motors.set(0.8, 0.8);
        motors.set(0.8, 0.8);
        motors.set(0.8, 0.8);
        motors.stop();
        let (l, r) = motors.speeds();
        assert!((l - 0.5).abs() < 1e-6);
        assert!((r - 0.5).abs() < 1e-6);
    }
}
