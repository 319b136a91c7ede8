//! Rig error types.

use pitch_proto::ProtoError;
use thiserror::Error;

/// Errors raised by the bus backends and device controllers.
#[derive(Debug, Error)]
pub enum RigError {
    /// I2C transfer failed.
    #[error("I2C error at address {addr:#04x}: {message}")]
    I2c { addr: u16, message: String },

    /// GPIO access failed.
    #[error("GPIO error: {0}")]
    Gpio(String),

    /// Protocol-level encode/decode failure.
    #[error("Protocol error: {0}")]
    Proto(#[from] ProtoError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The peripheral is still capturing; the buffer is not ready.
    #[error("Capture still in progress; try again later")]
    CaptureBusy,

    /// A chunk download aborted mid-buffer.
    #[error("Chunk read failed at offset {offset}: {source}")]
    ChunkFailed { offset: u16, source: ProtoError },

    /// Operation refused because the E-stop latch is engaged.
    #[error("E-stop is engaged")]
    EstopEngaged,

    /// Requested operating speed exceeds the configured ceiling.
    #[error("Operating speed {requested:.3} Hz exceeds the limit of {limit:.3} Hz")]
    SpeedLimit { requested: f64, limit: f64 },

    /// The motor controller reported a fault.
    #[error("Motor controller reported a fault")]
    MotorFault,

    /// Requested backend is not available on this platform.
    #[error("Unsupported backend: {0}")]
    Unsupported(String),
}

/// Result type alias using RigError.
pub type RigResult<T> = Result<T, RigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RigError::I2c {
            addr: 0x60,
            message: "timeout".to_string(),
        };
        assert_eq!(err.to_string(), "I2C error at address 0x60: timeout");

        let err = RigError::SpeedLimit {
            requested: 70.0,
            limit: 66.667,
        };
        assert!(err.to_string().contains("70.000"));
        assert!(err.to_string().contains("66.667"));
    }

    #[test]
    fn test_proto_error_converts() {
        let proto = ProtoError::SampleCount(0);
        let err: RigError = proto.into();
        assert!(matches!(err, RigError::Proto(_)));
    }
}
