//! PCA9685 16-channel PWM expander, driven at the register level.
//!
//! Register contract per channel: a 16-bit ON count and a 16-bit OFF count,
//! written as four single-byte registers (ON_L, ON_H, OFF_L, OFF_H).
//! Output frequency comes from a prescaler over the 25 MHz internal
//! oscillator, programmable only while the SLEEP bit is set.
//!
//! Fault policy: the constructor's first register access is strict — an
//! absent device is fatal at startup. After that, every register I/O
//! failure is logged, counted on an observable counter, and execution
//! continues (failed reads yield 0). Transient bus noise must not take
//! the robot down mid-run; the counter keeps the degradation visible.

use crate::error::{TracerError, TracerResult};
use crate::hardware::i2c::I2cBus;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const MODE1: u8 = 0x00;
const PRESCALE: u8 = 0xFE;
const LED0_ON_L: u8 = 0x06;

const MODE1_SLEEP: u8 = 0x10;
const MODE1_RESTART: u8 = 0x80;

const CHANNEL_COUNT: u8 = 16;
const OSC_CLOCK_HZ: f64 = 25_000_000.0;
const COUNTS_PER_CYCLE: f64 = 4096.0;

/// Compute the PRESCALE register value for an output frequency.
/// Half-integer quotients round away from zero.
pub fn prescale_for(freq_hz: f64) -> u8 {
    ((OSC_CLOCK_HZ / (COUNTS_PER_CYCLE * freq_hz)).round() - 1.0) as u8
}

/// PCA9685 driver over any [`I2cBus`] transport.
pub struct Pca9685 {
    bus: Box<dyn I2cBus>,
    address: u8,
    faults: Arc<AtomicU64>,
}

impl Pca9685 {
    /// Wake the device (MODE1 = 0) and zero every channel.
    ///
    /// The wake write is strict: if the device does not respond, this is
    /// a device-open failure and the process should not enter its run
    /// loop.
    pub fn new(mut bus: Box<dyn I2cBus>, address: u8) -> TracerResult<Self> {
        bus.write_byte_data(address, MODE1, 0x00).map_err(|e| {
            TracerError::InitializationFailed(format!(
                "PWM expander not responding at 0x{:02X}: {}",
                address, e
            ))
        })?;
        std::thread::sleep(Duration::from_millis(10));

        let mut pca = Self {
            bus,
            address,
            faults: Arc::new(AtomicU64::new(0)),
        };
        // Safe power-up state before any frequency or duty programming
        pca.stop_all();
        Ok(pca)
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Cumulative count of failed register reads/writes since construction.
    pub fn fault_count(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    /// Shared handle to the fault counter, for supervisors.
    pub fn fault_counter(&self) -> Arc<AtomicU64> {
        self.faults.clone()
    }

    fn write8(&mut self, reg: u8, value: u8) {
        if let Err(e) = self.bus.write_byte_data(self.address, reg, value) {
            self.faults.fetch_add(1, Ordering::Relaxed);
            crate::tlog!(warn, "I2C write reg 0x{:02X} failed: {}", reg, e);
        }
    }

    fn read8(&mut self, reg: u8) -> u8 {
        match self.bus.read_byte_data(self.address, reg) {
            Ok(value) => value,
            Err(e) => {
                self.faults.fetch_add(1, Ordering::Relaxed);
                crate::tlog!(warn, "I2C read reg 0x{:02X} failed: {}", reg, e);
                0
            }
        }
    }

    /// Each channel occupies 4 registers starting at LED0_ON_L.
    fn channel_base(channel: u8) -> u8 {
        LED0_ON_L + 4 * channel
    }

    /// Program raw ON/OFF counts (0..=4096) for one channel.
    pub fn set_pwm(&mut self, channel: u8, on: u16, off: u16) {
        let base = Self::channel_base(channel);
        self.write8(base, (on & 0xFF) as u8);
        self.write8(base + 1, (on >> 8) as u8);
        self.write8(base + 2, (off & 0xFF) as u8);
        self.write8(base + 3, (off >> 8) as u8);
    }

    /// Set a channel's duty cycle, 0.0 to 1.0 (clamped).
    pub fn set_duty(&mut self, channel: u8, ratio: f64) {
        let ratio = ratio.clamp(0.0, 1.0);
        if ratio <= 0.0 {
            self.set_pwm(channel, 0, 0);
        } else if ratio >= 1.0 {
            // Full-on uses the special ON=4096 encoding
            self.set_pwm(channel, 4096, 0);
        } else {
            self.set_pwm(channel, 0, (ratio * 4095.0).round() as u16);
        }
    }

    /// Use a channel as a digital output (100% or 0% duty).
    pub fn set_digital(&mut self, channel: u8, high: bool) {
        self.set_duty(channel, if high { 1.0 } else { 0.0 });
    }

    /// Program the output frequency.
    ///
    /// PRESCALE accepts writes only in SLEEP mode, so: read MODE1, enter
    /// sleep (RESTART masked off), write the prescaler, restore MODE1,
    /// let the oscillator settle, then set RESTART.
    pub fn set_frequency(&mut self, freq_hz: f64) {
        let prescale = prescale_for(freq_hz);

        let old_mode1 = self.read8(MODE1);
        let sleep_mode = (old_mode1 & !MODE1_RESTART) | MODE1_SLEEP;

        self.write8(MODE1, sleep_mode);
        self.write8(PRESCALE, prescale);
        self.write8(MODE1, old_mode1);
        std::thread::sleep(Duration::from_millis(5));
        self.write8(MODE1, old_mode1 | MODE1_RESTART);
    }

    /// Zero every channel's duty.
    pub fn stop_all(&mut self) {
        for channel in 0..CHANNEL_COUNT {
            self.set_duty(channel, 0.0);
        }
    }
}
