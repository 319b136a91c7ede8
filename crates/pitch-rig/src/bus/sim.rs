//! DEV_MODE backend: in-process register machines for both peripherals.
//!
//! Every host operation works unchanged against this backend. The motor
//! synthesizes HLFB duty samples from the commanded waveform and the
//! encoder produces an advancing shaft count, so a full
//! arm / run / capture / download / fit cycle can run on a desk with no
//! hardware attached.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use pitch_proto::{
    encode_samples, Command, Direction, MotorCommand, Status, Waveform, FRAME_LEN,
};

use crate::bus::{EnablePin, I2cBus};
use crate::config::RigConfig;
use crate::error::{RigError, RigResult};

/// Counts per shaft revolution of the simulated encoder.
const COUNTS_PER_REV: f64 = 4096.0;

/// Simulated I2C bus routing frames to the two register machines.
pub struct SimBus {
    motor_addr: u16,
    encoder_addr: u16,
    motor: SimMotor,
    encoder: SimEncoder,
    power: Arc<AtomicBool>,
}

impl SimBus {
    pub fn new(config: &RigConfig) -> Self {
        Self {
            motor_addr: config.motor_addr,
            encoder_addr: config.encoder_addr,
            motor: SimMotor::new(config.sample_rate_hz),
            encoder: SimEncoder::new(config.sample_rate_hz),
            power: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Handle to the simulated motor power state, for [`SimPin`].
    pub fn power_handle(&self) -> Arc<AtomicBool> {
        self.power.clone()
    }
}

impl I2cBus for SimBus {
    fn write_block(&mut self, addr: u16, _register: u8, data: &[u8]) -> RigResult<()> {
        let powered = self.power.load(Ordering::SeqCst);
        if addr == self.motor_addr {
            self.motor.handle_write(data, powered);
            Ok(())
        } else if addr == self.encoder_addr {
            let speed = self.motor.running_speed_hz();
            self.encoder.handle_write(data, speed);
            Ok(())
        } else {
            Err(RigError::I2c {
                addr,
                message: "no simulated device at this address".to_string(),
            })
        }
    }

    fn read_block(&mut self, addr: u16, _register: u8, len: usize) -> RigResult<Vec<u8>> {
        let block = if addr == self.motor_addr {
            self.motor.handle_read()
        } else if addr == self.encoder_addr {
            self.encoder.handle_read()
        } else {
            return Err(RigError::I2c {
                addr,
                message: "no simulated device at this address".to_string(),
            });
        };

        let mut out = block.to_vec();
        out.resize(len, 0);
        Ok(out)
    }
}

/// Simulated motor power enable line.
pub struct SimPin {
    state: Arc<AtomicBool>,
}

impl SimPin {
    pub fn new(state: Arc<AtomicBool>) -> Self {
        Self { state }
    }
}

impl EnablePin for SimPin {
    fn set_high(&mut self) -> RigResult<()> {
        self.state.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn set_low(&mut self) -> RigResult<()> {
        self.state.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_high(&self) -> bool {
        self.state.load(Ordering::SeqCst)
    }
}

/// Capture buffer served over the READY / READ_CHUNK protocol.
///
/// The first status poll after a capture reports CAPTURING, matching real
/// firmware that is still moving samples out of its ISR buffer.
struct CaptureBuffer {
    bytes: Vec<u8>,
    settle_polls: u8,
}

impl CaptureBuffer {
    fn new(samples: &[i32]) -> Self {
        Self {
            bytes: encode_samples(samples),
            settle_polls: 1,
        }
    }

    fn status_block(&mut self) -> [u8; FRAME_LEN] {
        let mut block = [0u8; FRAME_LEN];
        if self.settle_polls > 0 {
            self.settle_polls -= 1;
            block[0] = Status::Capturing.as_byte();
            return block;
        }
        let total = self.bytes.len() as u16;
        block[0] = Status::Ready.as_byte();
        block[1..3].copy_from_slice(&total.to_le_bytes());
        block
    }

    fn chunk_block(&self, offset: u16) -> [u8; FRAME_LEN] {
        let mut block = [0u8; FRAME_LEN];
        block[0] = Status::Chunk.as_byte();
        for i in 0..4 {
            let idx = offset as usize + i;
            block[1 + i] = self.bytes.get(idx).copied().unwrap_or(0);
        }
        block
    }
}

/// Pico 1 register machine.
struct SimMotor {
    sample_rate: f64,
    status: Status,
    command: Option<MotorCommand>,
    capture: Option<CaptureBuffer>,
    pending_chunk: Option<u16>,
    rng: StdRng,
}

impl SimMotor {
    fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            status: Status::MotorIdle,
            command: None,
            capture: None,
            pending_chunk: None,
            rng: StdRng::seed_from_u64(0x7069_7463_68),
        }
    }

    fn running_speed_hz(&self) -> f64 {
        match (self.status, &self.command) {
            (Status::MotorRunning, Some(cmd)) => cmd.speed_hz,
            _ => 0.0,
        }
    }

    fn handle_write(&mut self, data: &[u8], powered: bool) {
        self.pending_chunk = None;
        let Some(&cmd_byte) = data.first() else {
            return;
        };
        match Command::try_from(cmd_byte) {
            Ok(Command::Start) => {
                if !powered {
                    self.status = Status::Fault;
                    return;
                }
                self.command = decode_start(data);
                self.capture = None;
                self.status = if self.command.is_some() {
                    Status::MotorRunning
                } else {
                    Status::Fault
                };
            }
            Ok(Command::Stop) => {
                self.status = Status::MotorIdle;
                self.capture = None;
            }
            Ok(Command::EmergencyStop) => {
                self.status = Status::MotorIdle;
                self.command = None;
                self.capture = None;
            }
            Ok(Command::CaptureHlfb) => {
                let samples = data.get(1).copied().unwrap_or(0) as usize;
                let series = self.synthesize_hlfb(samples);
                self.capture = Some(CaptureBuffer::new(&series));
            }
            Ok(Command::ReadChunk) => {
                let offset = u16::from_le_bytes([
                    data.get(1).copied().unwrap_or(0),
                    data.get(2).copied().unwrap_or(0),
                ]);
                self.pending_chunk = Some(offset);
            }
            _ => {}
        }
    }

    fn handle_read(&mut self) -> [u8; FRAME_LEN] {
        if let (Some(offset), Some(capture)) = (self.pending_chunk.take(), self.capture.as_ref()) {
            return capture.chunk_block(offset);
        }
        if let Some(capture) = self.capture.as_mut() {
            return capture.status_block();
        }
        let mut block = [0u8; FRAME_LEN];
        block[0] = self.status.as_byte();
        block
    }

    /// HLFB duty in centi-percent: 50% mean, 45% swing at the commanded
    /// waveform, plus up to 1% of sensor noise.
    fn synthesize_hlfb(&mut self, samples: usize) -> Vec<i32> {
        let (freq, shape) = match &self.command {
            Some(cmd) if self.status == Status::MotorRunning => (cmd.speed_hz, cmd.waveform),
            _ => (0.0, Waveform::Sine),
        };

        (0..samples)
            .map(|i| {
                let t = i as f64 / self.sample_rate;
                let phase = 2.0 * std::f64::consts::PI * freq * t;
                let swing = match shape {
                    Waveform::Sine => phase.sin(),
                    Waveform::Square => {
                        if phase.sin() >= 0.0 {
                            1.0
                        } else {
                            -1.0
                        }
                    }
                    Waveform::Triangle => {
                        2.0 / std::f64::consts::PI * phase.sin().asin()
                    }
                };
                let noise: i32 = self.rng.gen_range(-100..=100);
                5000 + (4500.0 * swing) as i32 + noise
            })
            .collect()
    }
}

/// Pico 2 register machine.
struct SimEncoder {
    sample_rate: f64,
    position: u32,
    single_shot: Option<u32>,
    capture: Option<CaptureBuffer>,
    pending_chunk: Option<u16>,
    rng: StdRng,
}

impl SimEncoder {
    fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            position: 0,
            single_shot: None,
            capture: None,
            pending_chunk: None,
            rng: StdRng::seed_from_u64(0x656e_636f_64),
        }
    }

    fn handle_write(&mut self, data: &[u8], motor_speed_hz: f64) {
        self.pending_chunk = None;
        self.single_shot = None;
        let Some(&cmd_byte) = data.first() else {
            return;
        };
        match Command::try_from(cmd_byte) {
            Ok(Command::SingleShot) => {
                self.position = self.position.wrapping_add(3);
                self.single_shot = Some(self.position);
            }
            Ok(Command::Record) => {
                let samples = data.get(1).copied().unwrap_or(0) as usize;
                let series = self.synthesize_counts(samples, motor_speed_hz);
                self.capture = Some(CaptureBuffer::new(&series));
            }
            Ok(Command::ReadChunk) => {
                let offset = u16::from_le_bytes([
                    data.get(1).copied().unwrap_or(0),
                    data.get(2).copied().unwrap_or(0),
                ]);
                self.pending_chunk = Some(offset);
            }
            _ => {}
        }
    }

    fn handle_read(&mut self) -> [u8; FRAME_LEN] {
        if let (Some(offset), Some(capture)) = (self.pending_chunk.take(), self.capture.as_ref()) {
            return capture.chunk_block(offset);
        }
        if let Some(position) = self.single_shot {
            let mut block = [0u8; FRAME_LEN];
            block[0] = Status::SingleShotReady.as_byte();
            block[1..5].copy_from_slice(&position.to_le_bytes());
            return block;
        }
        if let Some(capture) = self.capture.as_mut() {
            return capture.status_block();
        }
        let mut block = [0u8; FRAME_LEN];
        block[0] = Status::EncoderIdle.as_byte();
        block
    }

    /// Cumulative shaft counts advancing at the commanded speed, with a
    /// couple of counts of jitter per sample.
    fn synthesize_counts(&mut self, samples: usize, motor_speed_hz: f64) -> Vec<i32> {
        let step = if motor_speed_hz > 0.0 {
            motor_speed_hz * COUNTS_PER_REV / self.sample_rate
        } else {
            0.0
        };

        let base = self.position as i64;
        let series: Vec<i32> = (0..samples)
            .map(|i| {
                let jitter: i64 = self.rng.gen_range(-2..=2);
                (base + (step * i as f64) as i64 + jitter) as i32
            })
            .collect();

        if let Some(last) = series.last() {
            self.position = *last as u32;
        }
        series
    }
}

fn decode_start(data: &[u8]) -> Option<MotorCommand> {
    if data.len() < FRAME_LEN {
        return None;
    }
    let waveform = Waveform::try_from(data[1]).ok()?;
    let centi = u16::from_le_bytes([data[2], data[3]]);
    let direction = if data[5] == 0 {
        Direction::Cw
    } else {
        Direction::Ccw
    };
    Some(MotorCommand {
        waveform,
        speed_hz: f64::from(centi) / 100.0,
        ramp: data[4],
        direction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitch_proto::{decode_capture_status, decode_chunk, decode_position, CaptureState, Frame};

    fn sim() -> SimBus {
        SimBus::new(&RigConfig::default())
    }

    fn write_frame(bus: &mut SimBus, addr: u16, frame: Frame) {
        bus.write_block(addr, 0, frame.bytes()).unwrap();
    }

    #[test]
    fn test_unknown_address_rejected() {
        let mut bus = sim();
        assert!(bus.write_block(0x10, 0, &[0]).is_err());
        assert!(bus.read_block(0x10, 0, 6).is_err());
    }

    #[test]
    fn test_motor_start_and_stop() {
        let mut bus = sim();
        let cmd = MotorCommand {
            waveform: Waveform::Sine,
            speed_hz: 10.0,
            ramp: 50,
            direction: Direction::Cw,
        };
        write_frame(&mut bus, 0x58, Frame::start(&cmd).unwrap());
        let block = bus.read_block(0x58, 0, 6).unwrap();
        assert_eq!(block[0], Status::MotorRunning.as_byte());
        assert!((bus.motor.running_speed_hz() - 10.0).abs() < 1e-9);

        write_frame(&mut bus, 0x58, Frame::stop());
        let block = bus.read_block(0x58, 0, 6).unwrap();
        assert_eq!(block[0], Status::MotorIdle.as_byte());
    }

    #[test]
    fn test_motor_start_refused_without_power() {
        let mut bus = sim();
        bus.power_handle().store(false, Ordering::SeqCst);

        let cmd = MotorCommand {
            waveform: Waveform::Sine,
            speed_hz: 5.0,
            ramp: 0,
            direction: Direction::Cw,
        };
        write_frame(&mut bus, 0x58, Frame::start(&cmd).unwrap());
        let block = bus.read_block(0x58, 0, 6).unwrap();
        assert_eq!(block[0], Status::Fault.as_byte());
    }

    #[test]
    fn test_single_shot_positions_advance() {
        let mut bus = sim();
        write_frame(&mut bus, 0x60, Frame::single_shot());
        let first = decode_position(&bus.read_block(0x60, 0, 6).unwrap()).unwrap();
        write_frame(&mut bus, 0x60, Frame::single_shot());
        let second = decode_position(&bus.read_block(0x60, 0, 6).unwrap()).unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_record_then_download_protocol() {
        let mut bus = sim();
        write_frame(&mut bus, 0x60, Frame::record(8).unwrap());

        // First poll settles as capturing, second is ready.
        let block = bus.read_block(0x60, 0, 6).unwrap();
        assert_eq!(
            decode_capture_status(&block).unwrap(),
            CaptureState::Capturing
        );
        let block = bus.read_block(0x60, 0, 6).unwrap();
        let total = match decode_capture_status(&block).unwrap() {
            CaptureState::Ready { total_bytes } => total_bytes,
            other => panic!("expected ready, got {other:?}"),
        };
        assert_eq!(total, 32);

        let mut collected = Vec::new();
        let mut offset = 0u16;
        while (offset as usize) < total as usize {
            write_frame(&mut bus, 0x60, Frame::read_chunk(offset));
            let chunk = decode_chunk(&bus.read_block(0x60, 0, 6).unwrap()).unwrap();
            collected.extend_from_slice(&chunk);
            offset += 4;
        }
        let samples = pitch_proto::decode_samples(&collected);
        assert_eq!(samples.len(), 8);
    }

    #[test]
    fn test_encoder_counts_follow_motor_speed() {
        let mut bus = sim();
        let cmd = MotorCommand {
            waveform: Waveform::Sine,
            speed_hz: 12.0,
            ramp: 10,
            direction: Direction::Cw,
        };
        write_frame(&mut bus, 0x58, Frame::start(&cmd).unwrap());
        write_frame(&mut bus, 0x60, Frame::record(100).unwrap());

        // Drain the settle poll, then grab the buffer directly.
        let _ = bus.read_block(0x60, 0, 6).unwrap();
        let samples = {
            let capture = bus.encoder.capture.as_ref().unwrap();
            pitch_proto::decode_samples(&capture.bytes)
        };

        // 12 Hz at 4096 counts/rev sampled at 480 Hz is 102.4 counts/sample.
        let span = samples.last().unwrap() - samples.first().unwrap();
        let expected = 12.0 * COUNTS_PER_REV / 480.0 * 99.0;
        assert!((span as f64 - expected).abs() < expected * 0.05);
    }

    #[test]
    fn test_hlfb_capture_reserves_buffer_until_rearmed() {
        let mut bus = sim();
        write_frame(&mut bus, 0x58, Frame::capture_hlfb(4).unwrap());

        let _ = bus.read_block(0x58, 0, 6).unwrap(); // settle
        let first = bus.read_block(0x58, 0, 6).unwrap();
        let second = bus.read_block(0x58, 0, 6).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_idle_hlfb_sits_near_mid_duty() {
        let mut bus = sim();
        let series = bus.motor.synthesize_hlfb(16);
        for value in series {
            assert!((value - 5000).abs() <= 100, "idle duty {value} drifted");
        }
    }
}
