//! Single-wheel actuator: clamp, slew, dead-zone, hardware write.

use crate::config::{MotorConfig, WheelChannels};
use crate::hardware::Pca9685;

/// One wheel of an H-bridge drive: an enable (PWM) channel and two
/// direction channels on the PWM expander.
///
/// Holds the only piece of actuator state, `current_speed`, which chases
/// the commanded target by at most one slew step per call. The hardware
/// write applies dead-zone compensation: whenever motion is commanded,
/// the duty never drops below `min_power`, so commanded duty is
/// deliberately discontinuous at the stop threshold.
pub struct WheelActuator {
    channels: WheelChannels,
    slew_rate: f32,
    speed_limit: f32,
    stop_eps: f32,
    min_power: f32,
    current_speed: f32,
}

impl WheelActuator {
    pub fn new(channels: WheelChannels, config: &MotorConfig) -> Self {
        Self {
            channels,
            slew_rate: config.slew_rate,
            speed_limit: config.speed_limit,
            stop_eps: config.stop_eps,
            min_power: config.min_power,
            current_speed: 0.0,
        }
    }

    /// Speed the wheel has settled at after the last call.
    pub fn current_speed(&self) -> f32 {
        self.current_speed
    }

    /// Command a target speed in [-1, 1]; the actuator enforces its own
    /// tighter `speed_limit` ceiling regardless of what the controller
    /// asks for.
    pub fn set_target(&mut self, pca: &mut Pca9685, target: f32) {
        let target = target.clamp(-self.speed_limit, self.speed_limit);

        if self.slew_rate > 0.0 {
            let delta = target - self.current_speed;
            if delta.abs() > self.slew_rate {
                self.current_speed += if delta > 0.0 {
                    self.slew_rate
                } else {
                    -self.slew_rate
                };
            } else {
                self.current_speed = target;
            }
        } else {
            self.current_speed = target;
        }

        self.write_hardware(pca);
    }

    fn write_hardware(&self, pca: &mut Pca9685) {
        let speed = self.current_speed;
        if speed.abs() < self.stop_eps {
            // Stopped: both direction channels low, no drive
            pca.set_digital(self.channels.in1, false);
            pca.set_digital(self.channels.in2, false);
            pca.set_duty(self.channels.pwm, 0.0);
        } else {
            let duty = speed.abs().max(self.min_power) as f64;
            if speed > 0.0 {
                pca.set_digital(self.channels.in1, true);
                pca.set_digital(self.channels.in2, false);
            } else {
                pca.set_digital(self.channels.in1, false);
                pca.set_digital(self.channels.in2, true);
            }
            pca.set_duty(self.channels.pwm, duty);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::i2c::RecordingBus;
    use crate::hardware::Pca9685;

    const LED0_ON_L: u8 = 0x06;

    fn setup() -> (RecordingBus, Pca9685, WheelActuator) {
        let bus = RecordingBus::new();
        let pca = Pca9685::new(Box::new(bus.clone()), 0x40).unwrap();
        let wheel = WheelActuator::new(
            WheelChannels {
                pwm: 0,
                in1: 1,
                in2: 2,
            },
            &MotorConfig::default(),
        );
        (bus, pca, wheel)
    }

    /// Decode the OFF count last programmed on a channel.
    fn off_count(bus: &RecordingBus, channel: u8) -> u16 {
        let base = LED0_ON_L + 4 * channel;
        let low = bus.register(0x40, base + 2).unwrap_or(0) as u16;
        let high = bus.register(0x40, base + 3).unwrap_or(0) as u16;
        (high << 8) | low
    }

    /// Decode the ON count last programmed on a channel.
    fn on_count(bus: &RecordingBus, channel: u8) -> u16 {
        let base = LED0_ON_L + 4 * channel;
        let low = bus.register(0x40, base).unwrap_or(0) as u16;
        let high = bus.register(0x40, base + 1).unwrap_or(0) as u16;
        (high << 8) | low
    }

    #[test]
    fn slew_limits_speed_change() {
        let (_bus, mut pca, mut wheel) = setup();
        wheel.set_target(&mut pca, 0.8);
        assert!((wheel.current_speed() - 0.3).abs() < 1e-6);
        wheel.set_target(&mut pca, 0.8);
        assert!((wheel.current_speed() - 0.6).abs() < 1e-6);
        // Gap within one step: snap to target
        wheel.set_target(&mut pca, 0.8);
        assert!((wheel.current_speed() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn zero_slew_applies_target_immediately() {
        let (_bus, mut pca, _) = setup();
        let config = MotorConfig {
            slew_rate: 0.0,
            ..MotorConfig::default()
        };
        let mut wheel = WheelActuator::new(
            WheelChannels {
                pwm: 0,
                in1: 1,
                in2: 2,
            },
            &config,
        );
        wheel.set_target(&mut pca, 0.7);
        assert_eq!(wheel.current_speed(), 0.7);
    }

    #[test]
    fn target_clamped_to_speed_limit() {
        let (_bus, mut pca, _) = setup();
        let config = MotorConfig {
            slew_rate: 0.0,
            ..MotorConfig::default()
        };
        let mut wheel = WheelActuator::new(
            WheelChannels {
                pwm: 0,
                in1: 1,
                in2: 2,
            },
            &config,
        );
        wheel.set_target(&mut pca, 1.0);
        assert_eq!(wheel.current_speed(), 0.8);
        wheel.set_target(&mut pca, -1.0);
        // One call can't reverse past the limit in one go without slew,
        // it adopts the clamped target directly
        assert_eq!(wheel.current_speed(), -0.8);
    }

    #[test]
    fn dead_zone_floors_commanded_duty() {
        let (bus, mut pca, _) = setup();
        let config = MotorConfig {
            slew_rate: 0.0,
            ..MotorConfig::default()
        };
        let mut wheel = WheelActuator::new(
            WheelChannels {
                pwm: 0,
                in1: 1,
                in2: 2,
            },
            &config,
        );

        // 0.1 is above stop_eps but below min_power: floored to 0.21
        wheel.set_target(&mut pca, 0.1);
        assert_eq!(off_count(&bus, 0), (0.21f64 * 4095.0).round() as u16);
        // Forward: in1 full-on, in2 off
        assert_eq!(on_count(&bus, 1), 4096);
        assert_eq!(on_count(&bus, 2), 0);
        assert_eq!(off_count(&bus, 2), 0);

        // Above min_power the duty tracks the speed
        wheel.set_target(&mut pca, 0.5);
        assert_eq!(off_count(&bus, 0), (0.5f64 * 4095.0).round() as u16);
    }

    #[test]
    fn below_stop_eps_stops_and_drops_direction_pins() {
        let (bus, mut pca, _) = setup();
        let config = MotorConfig {
            slew_rate: 0.0,
            ..MotorConfig::default()
        };
        let mut wheel = WheelActuator::new(
            WheelChannels {
                pwm: 0,
                in1: 1,
                in2: 2,
            },
            &config,
        );
        wheel.set_target(&mut pca, 0.5);
        wheel.set_target(&mut pca, 0.04);
        assert_eq!(off_count(&bus, 0), 0);
        assert_eq!(on_count(&bus, 0), 0);
        assert_eq!(on_count(&bus, 1), 0);
        assert_eq!(on_count(&bus, 2), 0);
    }

    #[test]
    fn at_stop_eps_boundary_drives() {
        let (bus, mut pca, _) = setup();
        let config = MotorConfig {
            slew_rate: 0.0,
            ..MotorConfig::default()
        };
        let mut wheel = WheelActuator::new(
            WheelChannels {
                pwm: 0,
                in1: 1,
                in2: 2,
            },
            &config,
        );
        wheel.set_target(&mut pca, 0.05);
        assert_eq!(off_count(&bus, 0), (0.21f64 * 4095.0).round() as u16);
        assert_eq!(on_count(&bus, 1), 4096);
    }

    #[test]
    fn reverse_swaps_direction_pins() {
        let (bus, mut pca, _) = setup();
        let config = MotorConfig {
            slew_rate: 0.0,
            ..MotorConfig::default()
        };
        let mut wheel = WheelActuator::new(
            WheelChannels {
                pwm: 0,
                in1: 1,
                in2: 2,
            },
            &config,
        );
        wheel.set_target(&mut pca, -0.5);
        assert_eq!(on_count(&bus, 1), 0);
        assert_eq!(on_count(&bus, 2), 4096);
        assert_eq!(off_count(&bus, 0), (0.5f64 * 4095.0).round() as u16);
    }

    #[test]
    fn deceleration_is_also_slewed() {
        let (_bus, mut pca, mut wheel) = setup();
        wheel.set_target(&mut pca, 0.8);
        wheel.set_target(&mut pca, 0.8);
        wheel.set_target(&mut pca, 0.8);
        assert!((wheel.current_speed() - 0.8).abs() < 1e-6);
        wheel.set_target(&mut pca, 0.0);
        assert!((wheel.current_speed() - 0.5).abs() < 1e-6);
        wheel.set_target(&mut pca, 0.0);
        assert!((wheel.current_speed() - 0.2).abs() < 1e-6);
        wheel.set_target(&mut pca, 0.0);
        assert_eq!(wheel.current_speed(), 0.0);
    }
}
