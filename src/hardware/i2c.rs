//! SMBus-style I2C bus access.
//!
//! The [`I2cBus`] trait is the seam between the PWM expander driver and
//! the transport: [`LinuxI2c`] talks to `/dev/i2c-N` through the kernel's
//! SMBus ioctls, [`RecordingBus`] is the in-memory backend used for tests
//! and hardware-free bring-up.

use crate::error::TracerResult;

/// Byte-register bus operations against a 7-bit device address.
pub trait I2cBus: Send {
    fn write_byte_data(&mut self, addr: u8, reg: u8, value: u8) -> TracerResult<()>;
    fn read_byte_data(&mut self, addr: u8, reg: u8) -> TracerResult<u8>;
}

#[cfg(unix)]
pub use linux::{enumerate_buses, find_device_bus, LinuxI2c};

#[cfg(unix)]
mod linux {
    use super::I2cBus;
    use crate::error::{TracerError, TracerResult};
    use std::fs::{self, File, OpenOptions};
    use std::os::unix::io::AsRawFd;

    const I2C_SLAVE: libc::c_ulong = 0x0703;
    const I2C_SMBUS: libc::c_ulong = 0x0720;

    const I2C_SMBUS_WRITE: u8 = 0;
    const I2C_SMBUS_READ: u8 = 1;
    const I2C_SMBUS_QUICK: u32 = 0;
    const I2C_SMBUS_BYTE_DATA: u32 = 2;

    /// Mirrors the kernel's `union i2c_smbus_data`; 34 bytes covers the
    /// block variant, the byte variant lives at offset 0.
    #[repr(C)]
    struct I2cSmbusData {
        block: [u8; 34],
    }

    #[repr(C)]
    struct I2cSmbusIoctlData {
        read_write: u8,
        command: u8,
        size: u32,
        data: *mut I2cSmbusData,
    }

    /// An open `/dev/i2c-N` character device.
    pub struct LinuxI2c {
        file: File,
        bus_number: u8,
        bound_addr: Option<u8>,
    }

    impl LinuxI2c {
        /// Open an I2C bus by number.
        pub fn open(bus_number: u8) -> TracerResult<Self> {
            let path = format!("/dev/i2c-{}", bus_number);
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&path)
                .map_err(|e| TracerError::driver(format!("cannot open {}: {}", path, e)))?;
            Ok(Self {
                file,
                bus_number,
                bound_addr: None,
            })
        }

        pub fn bus_number(&self) -> u8 {
            self.bus_number
        }

        fn bind(&mut self, addr: u8) -> TracerResult<()> {
            if self.bound_addr == Some(addr) {
                return Ok(());
            }
            let fd = self.file.as_raw_fd();
            // SAFETY: fd is a valid open I2C device. I2C_SLAVE sets the
            // target slave address for subsequent operations.
            let result = unsafe { libc::ioctl(fd, I2C_SLAVE, addr as libc::c_int) };
            if result < 0 {
                return Err(TracerError::driver(format!(
                    "I2C_SLAVE 0x{:02X} on bus {}: {}",
                    addr,
                    self.bus_number,
                    std::io::Error::last_os_error()
                )));
            }
            self.bound_addr = Some(addr);
            Ok(())
        }

        fn smbus_transfer(
            &mut self,
            read_write: u8,
            command: u8,
            size: u32,
            data: *mut I2cSmbusData,
        ) -> TracerResult<()> {
            let mut args = I2cSmbusIoctlData {
                read_write,
                command,
                size,
                data,
            };
            let fd = self.file.as_raw_fd();
            // SAFETY: fd is a valid open I2C device and args points to a
            // properly initialized ioctl argument struct.
            let result = unsafe { libc::ioctl(fd, I2C_SMBUS, &mut args as *mut _) };
            if result < 0 {
                return Err(TracerError::driver(format!(
                    "SMBus transfer on bus {}: {}",
                    self.bus_number,
                    std::io::Error::last_os_error()
                )));
            }
            Ok(())
        }

        /// Probe an address with an SMBus quick write (address byte only).
        pub fn probe(&mut self, addr: u8) -> bool {
            if self.bind(addr).is_err() {
                return false;
            }
            self.smbus_transfer(I2C_SMBUS_WRITE, 0, I2C_SMBUS_QUICK, std::ptr::null_mut())
                .is_ok()
        }
    }

    impl I2cBus for LinuxI2c {
        fn write_byte_data(&mut self, addr: u8, reg: u8, value: u8) -> TracerResult<()> {
            self.bind(addr)?;
            let mut data = I2cSmbusData { block: [0; 34] };
            data.block[0] = value;
            self.smbus_transfer(I2C_SMBUS_WRITE, reg, I2C_SMBUS_BYTE_DATA, &mut data)
        }

        fn read_byte_data(&mut self, addr: u8, reg: u8) -> TracerResult<u8> {
            self.bind(addr)?;
            let mut data = I2cSmbusData { block: [0; 34] };
            self.smbus_transfer(I2C_SMBUS_READ, reg, I2C_SMBUS_BYTE_DATA, &mut data)?;
            Ok(data.block[0])
        }
    }

    /// Enumerate I2C bus numbers by scanning /dev for i2c-* entries.
    pub fn enumerate_buses() -> Vec<u8> {
        let mut buses = Vec::new();
        if let Ok(entries) = fs::read_dir("/dev") {
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().to_string();
                if let Some(suffix) = name.strip_prefix("i2c-") {
                    if let Ok(bus_num) = suffix.parse::<u8>() {
                        buses.push(bus_num);
                    }
                }
            }
        }
        buses.sort_unstable();
        buses
    }

    /// Find the first bus with a device responding at `addr`.
    pub fn find_device_bus(addr: u8) -> Option<u8> {
        for bus_num in enumerate_buses() {
            if let Ok(mut bus) = LinuxI2c::open(bus_num) {
                if bus.probe(addr) {
                    return Some(bus_num);
                }
            }
        }
        None
    }

}

pub use recording::{BusWrite, RecordingBus};

mod recording {
    use super::I2cBus;
    use crate::error::{TracerError, TracerResult};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// One recorded register write.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BusWrite {
        pub addr: u8,
        pub reg: u8,
        pub value: u8,
    }

    /// In-memory bus backend.
    ///
    /// Records all register traffic and serves reads from the written
    /// register map, so driver behavior can be asserted byte-for-byte
    /// without hardware. Cloning yields another handle onto the same
    /// state, letting a test keep visibility after handing the bus to a
    /// driver. Fault injection flips writes/reads into errors to exercise
    /// the catch-log-continue policy.
    #[derive(Clone, Default)]
    pub struct RecordingBus {
        log: Arc<Mutex<Vec<BusWrite>>>,
        registers: Arc<Mutex<HashMap<(u8, u8), u8>>>,
        fail_writes: Arc<AtomicBool>,
        fail_reads: Arc<AtomicBool>,
    }

    impl RecordingBus {
        pub fn new() -> Self {
            Self::default()
        }

        /// All writes seen so far, oldest first.
        pub fn writes(&self) -> Vec<BusWrite> {
            self.log.lock().clone()
        }

        pub fn clear_log(&self) {
            self.log.lock().clear();
        }

        /// Latest value written to a register, if any.
        pub fn register(&self, addr: u8, reg: u8) -> Option<u8> {
            self.registers.lock().get(&(addr, reg)).copied()
        }

        /// Pre-load a register value (e.g. a device status register).
        pub fn set_register(&self, addr: u8, reg: u8, value: u8) {
            self.registers.lock().insert((addr, reg), value);
        }

        pub fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub fn set_fail_reads(&self, fail: bool) {
            self.fail_reads.store(fail, Ordering::SeqCst);
        }
    }

    impl I2cBus for RecordingBus {
        fn write_byte_data(&mut self, addr: u8, reg: u8, value: u8) -> TracerResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(TracerError::driver("injected write fault"));
            }
            self.log.lock().push(BusWrite { addr, reg, value });
            self.registers.lock().insert((addr, reg), value);
            Ok(())
        }

        fn read_byte_data(&mut self, addr: u8, reg: u8) -> TracerResult<u8> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(TracerError::driver("injected read fault"));
            }
            Ok(self.registers.lock().get(&(addr, reg)).copied().unwrap_or(0))
        }
    }

}
