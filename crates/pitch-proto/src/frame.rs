//! Command frame layout and builders.
//!
//! Every host-to-peripheral transfer is exactly [`FRAME_LEN`] bytes with the
//! command byte first. Bytes past the meaningful prefix are zero.

use serde::{Deserialize, Serialize};

use crate::command::MotorCommand;
use crate::error::ProtoError;

/// Fixed size of every command frame.
pub const FRAME_LEN: usize = 6;

/// Command bytes understood by the peripherals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Start the motor with the parameters in the frame body (Pico 1).
    Start,
    /// Ramp the motor down and stop (Pico 1).
    Stop,
    /// Emergency stop (Pico 1).
    EmergencyStop,
    /// Capture HLFB duty samples (Pico 1).
    CaptureHlfb,
    /// Arm a triggered encoder capture (Pico 2).
    Record,
    /// Request four buffer bytes at an offset (both peripherals).
    ReadChunk,
    /// Read the encoder position once, without the trigger (Pico 2).
    SingleShot,
}

impl Command {
    /// Wire byte for this command.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Start => 0x11,
            Self::Stop => 0x12,
            Self::EmergencyStop => 0x13,
            Self::CaptureHlfb => 0x14,
            Self::Record => 0x21,
            Self::ReadChunk => 0x22,
            Self::SingleShot => 0x23,
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = ProtoError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x11 => Ok(Self::Start),
            0x12 => Ok(Self::Stop),
            0x13 => Ok(Self::EmergencyStop),
            0x14 => Ok(Self::CaptureHlfb),
            0x21 => Ok(Self::Record),
            0x22 => Ok(Self::ReadChunk),
            0x23 => Ok(Self::SingleShot),
            other => Err(ProtoError::UnknownStatus(other)),
        }
    }
}

/// A 6-byte command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame([u8; FRAME_LEN]);

impl Frame {
    /// Build a frame from a command byte and payload bytes.
    ///
    /// The payload must leave room for the command byte.
    fn build(command: Command, payload: &[u8]) -> Self {
        debug_assert!(payload.len() < FRAME_LEN);
        let mut bytes = [0u8; FRAME_LEN];
        bytes[0] = command.as_byte();
        bytes[1..=payload.len()].copy_from_slice(payload);
        Self(bytes)
    }

    /// Motor start frame: `[START, waveform, speed_lo, speed_hi, ramp, dir]`.
    pub fn start(cmd: &MotorCommand) -> Result<Self, ProtoError> {
        let centi = cmd.speed_centihertz()?.to_le_bytes();
        Ok(Self::build(
            Command::Start,
            &[
                cmd.waveform.as_byte(),
                centi[0],
                centi[1],
                cmd.ramp,
                cmd.direction.as_byte(),
            ],
        ))
    }

    /// Motor stop frame.
    pub fn stop() -> Self {
        Self::build(Command::Stop, &[])
    }

    /// Emergency stop frame.
    pub fn emergency_stop() -> Self {
        Self::build(Command::EmergencyStop, &[])
    }

    /// HLFB capture frame: `[CAPTURE_HLFB, n_samples]`.
    pub fn capture_hlfb(samples: usize) -> Result<Self, ProtoError> {
        Ok(Self::build(Command::CaptureHlfb, &[sample_byte(samples)?]))
    }

    /// Encoder arm frame: `[RECORD, n_samples]`.
    pub fn record(samples: usize) -> Result<Self, ProtoError> {
        Ok(Self::build(Command::Record, &[sample_byte(samples)?]))
    }

    /// Chunk request frame: `[READ_CHUNK, offset_lo, offset_hi]`.
    pub fn read_chunk(offset: u16) -> Self {
        let off = offset.to_le_bytes();
        Self::build(Command::ReadChunk, &[off[0], off[1]])
    }

    /// Single-shot position read frame.
    pub fn single_shot() -> Self {
        Self::build(Command::SingleShot, &[])
    }

    /// The command byte in slot zero.
    pub fn command(&self) -> Result<Command, ProtoError> {
        Command::try_from(self.0[0])
    }

    /// Raw frame bytes.
    pub fn bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self([0u8; FRAME_LEN])
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}]",
            self.0
                .iter()
                .map(|b| format!("{b:#04x}"))
                .collect::<Vec<_>>()
                .join(" ")
        )
    }
}

fn sample_byte(samples: usize) -> Result<u8, ProtoError> {
    if samples == 0 || samples > 255 {
        return Err(ProtoError::SampleCount(samples));
    }
    Ok(samples as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Direction, Waveform};

    #[test]
    fn test_start_frame_layout() {
        let cmd = MotorCommand {
            waveform: Waveform::Triangle,
            speed_hz: 2.5,
            ramp: 200,
            direction: Direction::Ccw,
        };
        let frame = Frame::start(&cmd).unwrap();
        // 2.5 Hz = 250 centihertz = 0x00fa
        assert_eq!(frame.bytes(), &[0x11, 3, 0xfa, 0x00, 200, 1]);
        assert_eq!(frame.command().unwrap(), Command::Start);
    }

    #[test]
    fn test_stop_and_estop_frames() {
        assert_eq!(Frame::stop().bytes(), &[0x12, 0, 0, 0, 0, 0]);
        assert_eq!(Frame::emergency_stop().bytes(), &[0x13, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_record_frame() {
        let frame = Frame::record(200).unwrap();
        assert_eq!(frame.bytes(), &[0x21, 200, 0, 0, 0, 0]);

        assert!(Frame::record(0).is_err());
        assert!(Frame::record(256).is_err());
    }

    #[test]
    fn test_read_chunk_offset_encoding() {
        let frame = Frame::read_chunk(0x0304);
        assert_eq!(frame.bytes(), &[0x22, 0x04, 0x03, 0, 0, 0]);
    }

    #[test]
    fn test_single_shot_frame() {
        assert_eq!(Frame::single_shot().bytes(), &[0x23, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_frame_display() {
        let text = Frame::stop().to_string();
        assert!(text.starts_with("[0x12"));
    }
}
