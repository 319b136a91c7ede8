//! Protocol error types.

use thiserror::Error;

use crate::reply::Status;

/// Errors that can occur while encoding or decoding protocol payloads.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// Response block was shorter than the payload requires.
    #[error("Response truncated: expected at least {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },

    /// Status byte is not one defined by the protocol.
    #[error("Unknown status byte {0:#04x}")]
    UnknownStatus(u8),

    /// A well-formed status arrived where a different one was required.
    #[error("Unexpected status {0}")]
    UnexpectedStatus(Status),

    /// Waveform byte is not one defined by the protocol.
    #[error("Unknown waveform byte {0:#04x}")]
    UnknownWaveform(u8),

    /// Operating speed cannot be represented as centihertz on the wire.
    #[error("Operating speed {0} Hz does not fit the wire encoding (0..=655.35 Hz)")]
    SpeedOutOfRange(f64),

    /// Sample counts travel in a single byte.
    #[error("Sample count must be between 1 and 255, got {0}")]
    SampleCount(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtoError::UnknownStatus(0x7f);
        assert_eq!(err.to_string(), "Unknown status byte 0x7f");

        let err = ProtoError::SampleCount(0);
        assert_eq!(err.to_string(), "Sample count must be between 1 and 255, got 0");
    }
}
