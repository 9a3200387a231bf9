//! Hardware access: I2C bus and the PWM expander driver.

pub mod i2c;
pub mod pca9685;

pub use i2c::{I2cBus, RecordingBus};
pub use pca9685::Pca9685;

#[cfg(unix)]
pub use i2c::{enumerate_buses, find_device_bus, LinuxI2c};
