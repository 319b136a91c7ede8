//! Rig configuration.

use crate::error::{RigError, RigResult};

/// Rig configuration.
#[derive(Debug, Clone)]
pub struct RigConfig {
    /// Simulate I2C/GPIO instead of touching hardware.
    pub dev_mode: bool,

    /// I2C bus device path.
    pub bus_path: String,

    /// Pico 1 (motor controller) address.
    pub motor_addr: u16,

    /// Pico 2 (encoder sampler) address.
    pub encoder_addr: u16,

    /// GPIO number of the motor power enable line.
    pub enable_pin: u32,

    /// Maximum motor speed in rpm; the operating ceiling is max_rpm / 60 Hz.
    pub max_rpm: f64,

    /// HLFB capture sample rate in Hz.
    pub sample_rate_hz: f64,

    /// Default encoder capture size.
    pub encoder_samples: usize,

    /// Default HLFB capture size.
    pub hlfb_samples: usize,
}

impl RigConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> RigResult<Self> {
        let dev_mode = env_flag("DEV_MODE", true);

        let bus_path =
            std::env::var("I2C_BUS_PATH").unwrap_or_else(|_| "/dev/i2c-1".to_string());

        let motor_addr = env_addr("MOTOR_ADDR", pitch_proto::MOTOR_ADDR)?;
        let encoder_addr = env_addr("ENCODER_ADDR", pitch_proto::ENCODER_ADDR)?;

        let enable_pin: u32 = env_parse("ENABLE_PIN", 17)?;
        let max_rpm: f64 = env_parse("MAX_RPM", 4000.0)?;
        let sample_rate_hz: f64 = env_parse("SAMPLE_RATE_HZ", 480.0)?;
        let encoder_samples: usize = env_parse("ENCODER_SAMPLES", 200)?;
        let hlfb_samples: usize = env_parse("HLFB_SAMPLES", 50)?;

        if sample_rate_hz <= 0.0 {
            return Err(RigError::Config(
                "SAMPLE_RATE_HZ must be positive".to_string(),
            ));
        }
        if max_rpm <= 0.0 {
            return Err(RigError::Config("MAX_RPM must be positive".to_string()));
        }

        Ok(Self {
            dev_mode,
            bus_path,
            motor_addr,
            encoder_addr,
            enable_pin,
            max_rpm,
            sample_rate_hz,
            encoder_samples,
            hlfb_samples,
        })
    }

    /// Operating speed ceiling in Hz.
    pub fn speed_limit_hz(&self) -> f64 {
        self.max_rpm / 60.0
    }
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            dev_mode: true,
            bus_path: "/dev/i2c-1".to_string(),
            motor_addr: pitch_proto::MOTOR_ADDR,
            encoder_addr: pitch_proto::ENCODER_ADDR,
            enable_pin: 17,
            max_rpm: 4000.0,
            sample_rate_hz: 480.0,
            encoder_samples: 200,
            hlfb_samples: 50,
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(val) => matches!(
            val.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> RigResult<T> {
    match std::env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map_err(|_| RigError::Config(format!("{name} has an invalid value: {val}"))),
        Err(_) => Ok(default),
    }
}

/// Addresses accept decimal or 0x-prefixed hex.
fn env_addr(name: &str, default: u16) -> RigResult<u16> {
    match std::env::var(name) {
        Ok(val) => parse_addr(val.trim())
            .ok_or_else(|| RigError::Config(format!("{name} has an invalid address: {val}"))),
        Err(_) => Ok(default),
    }
}

fn parse_addr(s: &str) -> Option<u16> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = RigConfig::default();
        assert!(config.dev_mode);
        assert_eq!(config.motor_addr, 0x58);
        assert_eq!(config.encoder_addr, 0x60);
        assert_eq!(config.encoder_samples, 200);
        assert_eq!(config.hlfb_samples, 50);
    }

    #[test]
    fn test_speed_limit_hz() {
        let config = RigConfig::default();
        assert!((config.speed_limit_hz() - 66.6667).abs() < 1e-3);
    }

    #[test]
    fn test_parse_addr() {
        assert_eq!(parse_addr("0x60"), Some(0x60));
        assert_eq!(parse_addr("96"), Some(96));
        assert_eq!(parse_addr("pico"), None);
    }
}
