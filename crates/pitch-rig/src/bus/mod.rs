//! Bus abstraction: real hardware or DEV_MODE simulation behind one seam.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::RigConfig;
use crate::error::RigResult;

#[cfg(target_os = "linux")]
pub mod linux;
pub mod sim;

/// Block-transfer I2C access as the peripherals speak it.
pub trait I2cBus: Send {
    /// Write a block of bytes to a register of the device at `addr`.
    fn write_block(&mut self, addr: u16, register: u8, data: &[u8]) -> RigResult<()>;

    /// Read `len` bytes from a register of the device at `addr`.
    fn read_block(&mut self, addr: u16, register: u8, len: usize) -> RigResult<Vec<u8>>;
}

/// The motor power enable GPIO line.
pub trait EnablePin: Send {
    fn set_high(&mut self) -> RigResult<()>;
    fn set_low(&mut self) -> RigResult<()>;
    fn is_high(&self) -> bool;
}

/// Bus handle shared between the motor and encoder controllers.
pub type SharedBus = Arc<Mutex<dyn I2cBus>>;

/// Lock the shared bus, recovering from poisoning.
pub fn lock(bus: &SharedBus) -> MutexGuard<'_, dyn I2cBus + 'static> {
    bus.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Construct the backend pair selected by `DEV_MODE`.
pub fn open_backend(config: &RigConfig) -> RigResult<(SharedBus, Box<dyn EnablePin>)> {
    if config.dev_mode {
        let bus = sim::SimBus::new(config);
        let pin = Box::new(sim::SimPin::new(bus.power_handle()));
        let shared: SharedBus = Arc::new(Mutex::new(bus));
        return Ok((shared, pin));
    }

    #[cfg(target_os = "linux")]
    {
        let bus = linux::LinuxI2c::open(&config.bus_path)?;
        let pin = Box::new(linux::SysfsPin::open(config.enable_pin)?);
        let shared: SharedBus = Arc::new(Mutex::new(bus));
        Ok((shared, pin))
    }

    #[cfg(not(target_os = "linux"))]
    {
        Err(crate::error::RigError::Unsupported(
            "hardware backend requires Linux; set DEV_MODE=true".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_backend_dev_mode() {
        let config = RigConfig::default();
        let (bus, pin) = open_backend(&config).unwrap();
        assert!(pin.is_high());

        // The sim answers an idle encoder status straight away.
        let block = lock(&bus)
            .read_block(config.encoder_addr, 0, pitch_proto::FRAME_LEN)
            .unwrap();
        assert_eq!(block[0], pitch_proto::Status::EncoderIdle.as_byte());
    }
}
