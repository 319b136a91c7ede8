//! Hardware backend: `/dev/i2c-N` via the kernel SMBus interface and a
//! sysfs GPIO line for motor power enable.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use i2cdev::core::I2CDevice;
use i2cdev::linux::LinuxI2CDevice;

use crate::bus::{EnablePin, I2cBus};
use crate::error::{RigError, RigResult};

/// Real I2C bus. One kernel handle is opened lazily per slave address.
#[derive(Debug)]
pub struct LinuxI2c {
    path: PathBuf,
    devices: HashMap<u16, LinuxI2CDevice>,
}

impl LinuxI2c {
    /// Open the bus at `path` (e.g. `/dev/i2c-1`).
    ///
    /// Device handles are opened on first use per address; a missing bus
    /// path surfaces as a configuration error naming the path.
    pub fn open(path: &str) -> RigResult<Self> {
        if !Path::new(path).exists() {
            return Err(RigError::Config(format!(
                "I2C bus device {path} does not exist"
            )));
        }
        Ok(Self {
            path: PathBuf::from(path),
            devices: HashMap::new(),
        })
    }

    fn device(&mut self, addr: u16) -> RigResult<&mut LinuxI2CDevice> {
        match self.devices.entry(addr) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let dev = LinuxI2CDevice::new(&self.path, addr).map_err(|e| RigError::I2c {
                    addr,
                    message: e.to_string(),
                })?;
                Ok(entry.insert(dev))
            }
        }
    }
}

impl I2cBus for LinuxI2c {
    fn write_block(&mut self, addr: u16, register: u8, data: &[u8]) -> RigResult<()> {
        let dev = self.device(addr)?;
        dev.smbus_write_i2c_block_data(register, data)
            .map_err(|e| RigError::I2c {
                addr,
                message: e.to_string(),
            })
    }

    fn read_block(&mut self, addr: u16, register: u8, len: usize) -> RigResult<Vec<u8>> {
        let dev = self.device(addr)?;
        let block = dev
            .smbus_read_i2c_block_data(register, len as u8)
            .map_err(|e| RigError::I2c {
                addr,
                message: e.to_string(),
            })?;
        if block.len() < len {
            return Err(RigError::I2c {
                addr,
                message: format!("short read: wanted {len} bytes, got {}", block.len()),
            });
        }
        Ok(block)
    }
}

/// Motor power enable line over `/sys/class/gpio`.
pub struct SysfsPin {
    value_path: PathBuf,
    high: bool,
}

impl SysfsPin {
    /// Export the pin, set it as an output, and drive it high (power on).
    pub fn open(pin: u32) -> RigResult<Self> {
        let base = PathBuf::from("/sys/class/gpio");
        let pin_dir = base.join(format!("gpio{pin}"));

        if !pin_dir.exists() {
            // Export may fail with EBUSY if the pin is already exported.
            if let Err(e) = write_sysfs(&base.join("export"), &pin.to_string()) {
                if !pin_dir.exists() {
                    return Err(RigError::Gpio(format!("exporting gpio{pin}: {e}")));
                }
            }
        }

        write_sysfs(&pin_dir.join("direction"), "out")
            .map_err(|e| RigError::Gpio(format!("setting gpio{pin} direction: {e}")))?;

        let mut this = Self {
            value_path: pin_dir.join("value"),
            high: false,
        };
        this.set_high()?;
        Ok(this)
    }
}

impl EnablePin for SysfsPin {
    fn set_high(&mut self) -> RigResult<()> {
        write_sysfs(&self.value_path, "1").map_err(|e| RigError::Gpio(e.to_string()))?;
        self.high = true;
        Ok(())
    }

    fn set_low(&mut self) -> RigResult<()> {
        write_sysfs(&self.value_path, "0").map_err(|e| RigError::Gpio(e.to_string()))?;
        self.high = false;
        Ok(())
    }

    fn is_high(&self) -> bool {
        self.high
    }
}

fn write_sysfs(path: &Path, value: &str) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new().write(true).open(path)?;
    file.write_all(value.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_bus_path() {
        let err = LinuxI2c::open("/dev/i2c-none").unwrap_err();
        assert!(matches!(err, RigError::Config(_)));
        assert!(err.to_string().contains("/dev/i2c-none"));
    }
}
