//! Peripheral replies: status bytes and payload decoding.

use serde::{Deserialize, Serialize};

use crate::error::ProtoError;

/// Status bytes reported by the peripherals.
///
/// Pico 2 reports the 0x3x range; Pico 1 reports 0x4x plus the shared
/// capture statuses while serving HLFB data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Encoder idle, nothing armed.
    EncoderIdle,
    /// Capture in progress or buffer still being prepared.
    Capturing,
    /// Capture buffer complete; header carries the byte count.
    Ready,
    /// Chunk reply carrying four buffer bytes.
    Chunk,
    /// Single-shot position reply.
    SingleShotReady,
    /// Motor controller idle.
    MotorIdle,
    /// Motor running.
    MotorRunning,
    /// Motor controller fault (e.g. start refused with power off).
    Fault,
}

impl Status {
    /// Wire byte for this status.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::EncoderIdle => 0x31,
            Self::Capturing => 0x32,
            Self::Ready => 0x33,
            Self::Chunk => 0x34,
            Self::SingleShotReady => 0x35,
            Self::MotorIdle => 0x41,
            Self::MotorRunning => 0x42,
            Self::Fault => 0x43,
        }
    }
}

impl TryFrom<u8> for Status {
    type Error = ProtoError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x31 => Ok(Self::EncoderIdle),
            0x32 => Ok(Self::Capturing),
            0x33 => Ok(Self::Ready),
            0x34 => Ok(Self::Chunk),
            0x35 => Ok(Self::SingleShotReady),
            0x41 => Ok(Self::MotorIdle),
            0x42 => Ok(Self::MotorRunning),
            0x43 => Ok(Self::Fault),
            other => Err(ProtoError::UnknownStatus(other)),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::EncoderIdle => "encoder_idle",
            Self::Capturing => "capturing",
            Self::Ready => "ready",
            Self::Chunk => "chunk",
            Self::SingleShotReady => "single_shot_ready",
            Self::MotorIdle => "motor_idle",
            Self::MotorRunning => "motor_running",
            Self::Fault => "fault",
        };
        write!(f, "{} ({:#04x})", name, self.as_byte())
    }
}

/// Outcome of polling a peripheral after a capture command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Buffer not ready yet; poll again later.
    Capturing,
    /// Buffer ready; `total_bytes` are waiting for chunked download.
    Ready { total_bytes: u16 },
}

/// Decode the 6-byte status block read after a capture command.
///
/// A `Ready` header carries the total byte count little-endian in bytes 1-2.
pub fn decode_capture_status(block: &[u8]) -> Result<CaptureState, ProtoError> {
    require_len(block, 3)?;
    match Status::try_from(block[0])? {
        Status::Capturing => Ok(CaptureState::Capturing),
        Status::Ready => {
            let total_bytes = u16::from_le_bytes([block[1], block[2]]);
            Ok(CaptureState::Ready { total_bytes })
        }
        other => Err(ProtoError::UnexpectedStatus(other)),
    }
}

/// Decode a chunk reply: `[CHUNK, b0, b1, b2, b3]`.
pub fn decode_chunk(block: &[u8]) -> Result<[u8; 4], ProtoError> {
    require_len(block, 5)?;
    match Status::try_from(block[0])? {
        Status::Chunk => Ok([block[1], block[2], block[3], block[4]]),
        other => Err(ProtoError::UnexpectedStatus(other)),
    }
}

/// Decode a single-shot reply: `[SINGLE_SHOT_READY, u32-LE position]`.
pub fn decode_position(block: &[u8]) -> Result<u32, ProtoError> {
    require_len(block, 5)?;
    match Status::try_from(block[0])? {
        Status::SingleShotReady => Ok(u32::from_le_bytes([
            block[1], block[2], block[3], block[4],
        ])),
        other => Err(ProtoError::UnexpectedStatus(other)),
    }
}

/// Decode a downloaded buffer as little-endian i32 samples.
///
/// Only the whole-i32 prefix is decoded; trailing bytes are dropped.
pub fn decode_samples(bytes: &[u8]) -> Vec<i32> {
    bytes
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Encode samples as the peripherals lay them out in their capture buffers.
pub fn encode_samples(samples: &[i32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 4);
    for s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    bytes
}

fn require_len(block: &[u8], expected: usize) -> Result<(), ProtoError> {
    if block.len() < expected {
        return Err(ProtoError::Truncated {
            expected,
            got: block.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for byte in [0x31, 0x32, 0x33, 0x34, 0x35, 0x41, 0x42, 0x43] {
            let status = Status::try_from(byte).unwrap();
            assert_eq!(status.as_byte(), byte);
        }
        assert!(Status::try_from(0x00).is_err());
        assert!(Status::try_from(0x36).is_err());
    }

    #[test]
    fn test_decode_capture_status_ready() {
        // 0x0102 = 258 bytes waiting
        let block = [0x33, 0x02, 0x01, 0, 0, 0];
        match decode_capture_status(&block).unwrap() {
            CaptureState::Ready { total_bytes } => assert_eq!(total_bytes, 258),
            other => panic!("expected ready, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_capture_status_busy() {
        let block = [0x32, 0, 0, 0, 0, 0];
        assert_eq!(
            decode_capture_status(&block).unwrap(),
            CaptureState::Capturing
        );
    }

    #[test]
    fn test_decode_capture_status_rejects_others() {
        let block = [0x41, 0, 0, 0, 0, 0];
        assert!(matches!(
            decode_capture_status(&block),
            Err(ProtoError::UnexpectedStatus(Status::MotorIdle))
        ));
    }

    #[test]
    fn test_decode_chunk() {
        let block = [0x34, 1, 2, 3, 4, 0];
        assert_eq!(decode_chunk(&block).unwrap(), [1, 2, 3, 4]);

        let wrong = [0x33, 1, 2, 3, 4, 0];
        assert!(decode_chunk(&wrong).is_err());
    }

    #[test]
    fn test_decode_position() {
        let mut block = [0u8; 6];
        block[0] = 0x35;
        block[1..5].copy_from_slice(&1_000_000u32.to_le_bytes());
        assert_eq!(decode_position(&block).unwrap(), 1_000_000);
    }

    #[test]
    fn test_decode_position_truncated() {
        let block = [0x35, 1, 2];
        assert!(matches!(
            decode_position(&block),
            Err(ProtoError::Truncated { expected: 5, got: 3 })
        ));
    }

    #[test]
    fn test_samples_round_trip() {
        let samples = vec![0, -1, 4096, i32::MAX, i32::MIN];
        let bytes = encode_samples(&samples);
        assert_eq!(decode_samples(&bytes), samples);
    }

    #[test]
    fn test_decode_samples_drops_partial_tail() {
        let mut bytes = encode_samples(&[7, 8]);
        bytes.extend_from_slice(&[0xff, 0xff]);
        assert_eq!(decode_samples(&bytes), vec![7, 8]);
    }
}
