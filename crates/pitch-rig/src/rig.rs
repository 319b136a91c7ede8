//! Rig facade: one handle bundling the controllers and the session.

use serde::Serialize;

use pitch_proto::{MotorCommand, Status};

use crate::bus;
use crate::config::RigConfig;
use crate::encoder::EncoderClient;
use crate::error::{RigError, RigResult};
use crate::motor::MotorController;
use crate::session::{Session, SessionSnapshot};

/// The assembled rig: motor, encoder, and session over one bus backend.
pub struct Rig {
    config: RigConfig,
    motor: MotorController,
    encoder: EncoderClient,
    session: Session,
}

impl Rig {
    /// Build the rig from configuration, selecting the backend by
    /// `DEV_MODE`.
    pub fn new(config: RigConfig) -> RigResult<Self> {
        let (shared, enable) = bus::open_backend(&config)?;
        tracing::info!(
            dev_mode = config.dev_mode,
            bus = %config.bus_path,
            motor_addr = config.motor_addr,
            encoder_addr = config.encoder_addr,
            "Rig backend ready"
        );

        let motor = MotorController::new(
            shared.clone(),
            enable,
            config.motor_addr,
            config.max_rpm,
            config.sample_rate_hz,
        );
        let encoder = EncoderClient::new(shared, config.encoder_addr);

        Ok(Self {
            config,
            motor,
            encoder,
            session: Session::new(),
        })
    }

    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Change the speed ceiling for subsequent starts.
    pub fn set_max_rpm(&mut self, max_rpm: f64) {
        self.motor.set_max_rpm(max_rpm);
        self.session.max_rpm = Some(max_rpm);
    }

    /// Start the motor; refused while the E-stop latch is set.
    pub async fn start(&mut self, cmd: &MotorCommand) -> RigResult<f64> {
        if self.session.estop_engaged() {
            return Err(RigError::EstopEngaged);
        }
        let speed = self.motor.start(cmd).await?;
        self.session.last_speed_hz = speed;
        Ok(speed)
    }

    /// Stop the motor.
    pub async fn stop(&mut self) -> RigResult<()> {
        self.motor.stop().await
    }

    /// Engage the E-stop: power cut and latch set.
    pub async fn emergency_stop(&mut self) -> RigResult<()> {
        self.motor.emergency_stop().await?;
        self.session.engage_estop();
        Ok(())
    }

    /// Release the E-stop latch and restore motor power.
    ///
    /// The motor does not restart; the panel merely re-enables.
    pub fn release_estop(&mut self) -> RigResult<()> {
        self.motor.power_on()?;
        self.session.release_estop();
        tracing::info!("E-stop released, panel re-enabled (motor remains stopped)");
        Ok(())
    }

    /// Single-shot encoder position.
    pub async fn read_position(&self) -> RigResult<u32> {
        self.encoder.read_position().await
    }

    /// Arm the encoder; refused while the E-stop latch is set.
    pub async fn arm_encoder(&mut self, samples: usize) -> RigResult<()> {
        if self.session.estop_engaged() {
            return Err(RigError::EstopEngaged);
        }
        self.encoder.arm(samples).await
    }

    /// Download the armed encoder capture into the session.
    pub async fn download_encoder(&mut self) -> RigResult<usize> {
        let samples = self.encoder.download().await?;
        let count = samples.len();
        self.session.record_encoder(samples);
        Ok(count)
    }

    /// Capture HLFB samples into the session.
    pub async fn capture_hlfb(&mut self, samples: usize) -> RigResult<usize> {
        let data = self.motor.capture_hlfb(samples).await?;
        let count = data.len();
        self.session.record_hlfb(data);
        Ok(count)
    }

    /// Reset session inputs and data; the E-stop latch survives.
    pub fn reset(&mut self) {
        self.session.reset();
        self.motor.set_max_rpm(self.config.max_rpm);
        tracing::info!("Session state reset to defaults");
    }

    /// Poll both peripherals and assemble a status report.
    pub async fn status(&self) -> RigStatus {
        RigStatus {
            dev_mode: self.config.dev_mode,
            powered: self.motor.is_powered(),
            motor: self.motor.status().await.map_err(|e| e.to_string()),
            encoder: self.encoder.status().await.map_err(|e| e.to_string()),
            session: self.session.snapshot(),
        }
    }
}

/// Full status report for display or JSON output.
#[derive(Debug, Serialize)]
pub struct RigStatus {
    pub dev_mode: bool,
    pub powered: bool,
    pub motor: Result<Status, String>,
    pub encoder: Result<Status, String>,
    pub session: SessionSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitch_proto::{Direction, Waveform};

    fn rig() -> Rig {
        Rig::new(RigConfig::default()).unwrap()
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
    async fn test_full_capture_cycle() {
        let mut rig = rig();
        rig.start(&command(12.0)).await.unwrap();
        rig.arm_encoder(30).await.unwrap();
        let hlfb = rig.capture_hlfb(20).await.unwrap();
        let enc = rig.download_encoder().await.unwrap();
        rig.stop().await.unwrap();

        assert_eq!(hlfb, 20);
        assert_eq!(enc, 30);
        assert_eq!(rig.session().hlfb.len(), 20);
        assert_eq!(rig.session().encoder.len(), 30);
        assert!((rig.session().last_speed_hz - 12.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_estop_blocks_start_and_arm() {
        let mut rig = rig();
        rig.emergency_stop().await.unwrap();

        assert!(matches!(
            rig.start(&command(5.0)).await.unwrap_err(),
            RigError::EstopEngaged
        ));
        assert!(matches!(
            rig.arm_encoder(10).await.unwrap_err(),
            RigError::EstopEngaged
        ));
    }

    #[tokio::test]
    async fn test_release_estop_restores_start() {
        let mut rig = rig();
        rig.emergency_stop().await.unwrap();
        rig.release_estop().unwrap();

        assert!(rig.start(&command(5.0)).await.is_ok());
    }

    #[tokio::test]
    async fn test_reset_keeps_latch() {
        let mut rig = rig();
        rig.capture_hlfb(10).await.unwrap();
        rig.emergency_stop().await.unwrap();
        rig.reset();

        assert!(rig.session().estop_engaged());
        assert!(rig.session().hlfb.is_empty());
    }

    #[tokio::test]
    async fn test_set_max_rpm_lowers_ceiling() {
        let mut rig = rig();
        rig.set_max_rpm(600.0); // ceiling now 10 Hz

        assert!(matches!(
            rig.start(&command(12.0)).await.unwrap_err(),
            RigError::SpeedLimit { .. }
        ));
        assert!(rig.start(&command(9.0)).await.is_ok());
    }

    #[tokio::test]
    async fn test_status_report() {
        let rig = rig();
        let status = rig.status().await;
        assert!(status.dev_mode);
        assert!(status.powered);
        assert_eq!(status.encoder.unwrap(), Status::EncoderIdle);
        assert_eq!(status.motor.unwrap(), Status::MotorIdle);
    }
}
