//! Pitch Master I2C wire protocol.
//!
//! The rig has two microcontroller peripherals on one I2C bus:
//! - Pico 1 (motor controller) accepts 6-byte command frames and serves
//!   captured HLFB duty samples back over a chunked read protocol.
//! - Pico 2 (encoder sampler) supports single-shot position reads, armed
//!   captures, and the same chunked download protocol.
//!
//! This crate defines the frame layout, command and status bytes, and the
//! payload codecs. It performs no I/O.

pub mod command;
pub mod error;
pub mod frame;
pub mod reply;

pub use command::{Direction, MotorCommand, Waveform};
pub use error::ProtoError;
pub use frame::{Command, Frame, FRAME_LEN};
pub use reply::{
    decode_capture_status, decode_chunk, decode_position, decode_samples, encode_samples,
    CaptureState, Status,
};

/// Default I2C address of the Pico 1 motor controller.
pub const MOTOR_ADDR: u16 = 0x58;

/// Default I2C address of the Pico 2 encoder sampler (96 decimal).
pub const ENCODER_ADDR: u16 = 0x60;
