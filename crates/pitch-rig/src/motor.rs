//! Motor controller (Pico 1) operations.

use std::time::Duration;

use pitch_proto::{Frame, MotorCommand, Status, FRAME_LEN};

use crate::bus::{self, EnablePin, SharedBus};
use crate::error::{RigError, RigResult};
use crate::transfer;

/// Settle time between a command write and the follow-up status read.
const COMMAND_DELAY: Duration = Duration::from_millis(10);

/// Extra wait after an HLFB capture beyond the sample window itself.
const CAPTURE_MARGIN: Duration = Duration::from_millis(50);

/// Typed operations against the Pico 1 motor controller.
///
/// Owns the motor power enable line; the E-stop latch itself lives in the
/// session layer.
pub struct MotorController {
    shared: SharedBus,
    enable: Box<dyn EnablePin>,
    addr: u16,
    max_rpm: f64,
    sample_rate_hz: f64,
}

impl MotorController {
    pub fn new(
        shared: SharedBus,
        enable: Box<dyn EnablePin>,
        addr: u16,
        max_rpm: f64,
        sample_rate_hz: f64,
    ) -> Self {
        Self {
            shared,
            enable,
            addr,
            max_rpm,
            sample_rate_hz,
        }
    }

    /// Operating speed ceiling in Hz.
    pub fn speed_limit_hz(&self) -> f64 {
        self.max_rpm / 60.0
    }

    /// Change the speed ceiling (rpm).
    pub fn set_max_rpm(&mut self, max_rpm: f64) {
        self.max_rpm = max_rpm;
    }

    /// Whether the power enable line is high.
    pub fn is_powered(&self) -> bool {
        self.enable.is_high()
    }

    /// Re-raise the power enable line after an E-stop release.
    pub fn power_on(&mut self) -> RigResult<()> {
        self.enable.set_high()
    }

    /// Start the motor. Returns the commanded operating speed in Hz.
    ///
    /// The speed ceiling is enforced host-side; an over-limit command never
    /// reaches the bus.
    pub async fn start(&mut self, cmd: &MotorCommand) -> RigResult<f64> {
        if !self.enable.is_high() {
            return Err(RigError::EstopEngaged);
        }

        let limit = self.speed_limit_hz();
        if cmd.speed_hz > limit {
            return Err(RigError::SpeedLimit {
                requested: cmd.speed_hz,
                limit,
            });
        }

        let frame = Frame::start(cmd)?;
        bus::lock(&self.shared).write_block(self.addr, 0, frame.bytes())?;
        tokio::time::sleep(COMMAND_DELAY).await;

        match self.status().await? {
            Status::MotorRunning => {
                tracing::info!(
                    speed_hz = cmd.speed_hz,
                    waveform = %cmd.waveform,
                    ramp = cmd.ramp,
                    direction = %cmd.direction,
                    "Motor started"
                );
                Ok(cmd.speed_hz)
            }
            Status::Fault => Err(RigError::MotorFault),
            other => {
                tracing::warn!(status = %other, "Unexpected status after start");
                Ok(cmd.speed_hz)
            }
        }
    }

    /// Ramp the motor down and stop.
    pub async fn stop(&mut self) -> RigResult<()> {
        bus::lock(&self.shared).write_block(self.addr, 0, Frame::stop().bytes())?;
        tracing::info!("Motor stop command sent");
        Ok(())
    }

    /// Emergency stop: drop the enable line, then tell the controller.
    ///
    /// The pin drop is the safety action; a bus failure afterwards is
    /// logged but does not fail the operation.
    pub async fn emergency_stop(&mut self) -> RigResult<()> {
        self.enable.set_low()?;

        let write = bus::lock(&self.shared).write_block(
            self.addr,
            0,
            Frame::emergency_stop().bytes(),
        );
        if let Err(e) = write {
            tracing::warn!(error = %e, "E-stop frame write failed; motor power already cut");
        }

        tracing::warn!("E-stop engaged, motor power cut");
        Ok(())
    }

    /// Capture HLFB duty samples and download them.
    pub async fn capture_hlfb(&mut self, samples: usize) -> RigResult<Vec<i32>> {
        let frame = Frame::capture_hlfb(samples)?;
        bus::lock(&self.shared).write_block(self.addr, 0, frame.bytes())?;

        // Wait out the sample window before polling for the buffer.
        let window = Duration::from_secs_f64(samples as f64 / self.sample_rate_hz);
        tokio::time::sleep(window + CAPTURE_MARGIN).await;

        let data = transfer::download(&self.shared, self.addr).await?;
        tracing::info!(samples = data.len(), "HLFB capture downloaded");
        Ok(data)
    }

    /// Current controller status byte.
    pub async fn status(&self) -> RigResult<Status> {
        let block = bus::lock(&self.shared).read_block(self.addr, 0, FRAME_LEN)?;
        Ok(Status::try_from(block[0])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use pitch_proto::{Direction, Waveform};

    use crate::bus::sim::{SimBus, SimPin};
    use crate::config::RigConfig;

    fn motor() -> MotorController {
        let config = RigConfig::default();
        let sim = SimBus::new(&config);
        let pin = Box::new(SimPin::new(sim.power_handle()));
        let shared: SharedBus = Arc::new(Mutex::new(sim));
        MotorController::new(
            shared,
            pin,
            config.motor_addr,
            config.max_rpm,
            config.sample_rate_hz,
        )
    }

    fn command(speed_hz: f64) -> MotorCommand {
        MotorCommand {
            waveform: Waveform::Sine,
            speed_hz,
            ramp: 50,
            direction: Direction::Cw,
        }
    }

    #[tokio::test]
    async fn test_start_and_status() {
        let mut motor = motor();
        let speed = motor.start(&command(20.0)).await.unwrap();
        assert!((speed - 20.0).abs() < 1e-9);
        assert_eq!(motor.status().await.unwrap(), Status::MotorRunning);

        motor.stop().await.unwrap();
        assert_eq!(motor.status().await.unwrap(), Status::MotorIdle);
    }

    #[tokio::test]
    async fn test_start_rejects_over_limit_speed() {
        let mut motor = motor();
        // Ceiling is 4000 rpm / 60 = 66.67 Hz.
        let err = motor.start(&command(70.0)).await.unwrap_err();
        assert!(matches!(err, RigError::SpeedLimit { .. }));
        // Never reached the bus: the sim motor is still idle.
        assert_eq!(motor.status().await.unwrap(), Status::MotorIdle);
    }

    #[tokio::test]
    async fn test_start_refused_after_estop() {
        let mut motor = motor();
        motor.emergency_stop().await.unwrap();
        assert!(!motor.is_powered());

        let err = motor.start(&command(10.0)).await.unwrap_err();
        assert!(matches!(err, RigError::EstopEngaged));

        motor.power_on().unwrap();
        assert!(motor.start(&command(10.0)).await.is_ok());
    }

    #[tokio::test]
    async fn test_capture_hlfb_downloads_requested_samples() {
        let mut motor = motor();
        motor.start(&command(15.0)).await.unwrap();

        let data = motor.capture_hlfb(40).await.unwrap();
        assert_eq!(data.len(), 40);
        // Duty stays within 0..=100% in centi-percent.
        assert!(data.iter().all(|&d| (0..=10_000).contains(&d)));
    }

    #[tokio::test]
    async fn test_capture_hlfb_rejects_zero_samples() {
        let mut motor = motor();
        assert!(motor.capture_hlfb(0).await.is_err());
    }
}
