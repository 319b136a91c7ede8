//! Encoder sampler (Pico 2) operations.

use std::time::Duration;

use pitch_proto::{decode_position, Frame, Status, FRAME_LEN};

use crate::bus::{self, SharedBus};
use crate::error::RigResult;
use crate::transfer;

/// Settle time after a single-shot request.
const SINGLE_SHOT_DELAY: Duration = Duration::from_millis(10);

/// Settle time after an arm command.
const ARM_DELAY: Duration = Duration::from_millis(100);

/// Typed operations against the Pico 2 encoder sampler.
pub struct EncoderClient {
    shared: SharedBus,
    addr: u16,
}

impl EncoderClient {
    pub fn new(shared: SharedBus, addr: u16) -> Self {
        Self { shared, addr }
    }

    /// Read the shaft position once, without the trigger pin.
    pub async fn read_position(&self) -> RigResult<u32> {
        bus::lock(&self.shared).write_block(self.addr, 0, Frame::single_shot().bytes())?;
        tokio::time::sleep(SINGLE_SHOT_DELAY).await;

        let block = bus::lock(&self.shared).read_block(self.addr, 0, FRAME_LEN)?;
        let position = decode_position(&block)?;
        tracing::debug!(position, "Single-shot position read");
        Ok(position)
    }

    /// Arm a triggered capture of `samples` encoder readings.
    pub async fn arm(&self, samples: usize) -> RigResult<()> {
        let frame = Frame::record(samples)?;
        bus::lock(&self.shared).write_block(self.addr, 0, frame.bytes())?;
        tokio::time::sleep(ARM_DELAY).await;

        tracing::info!(samples, "Encoder armed, waiting for triggers");
        Ok(())
    }

    /// Download a completed capture as signed shaft counts.
    pub async fn download(&self) -> RigResult<Vec<i32>> {
        let data = transfer::download(&self.shared, self.addr).await?;
        tracing::info!(samples = data.len(), "Encoder capture downloaded");
        Ok(data)
    }

    /// Current sampler status byte.
    pub async fn status(&self) -> RigResult<Status> {
        let block = bus::lock(&self.shared).read_block(self.addr, 0, FRAME_LEN)?;
        Ok(Status::try_from(block[0])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::bus::sim::SimBus;
    use crate::config::RigConfig;

    fn encoder() -> EncoderClient {
        let config = RigConfig::default();
        let sim = SimBus::new(&config);
        let shared: SharedBus = Arc::new(Mutex::new(sim));
        EncoderClient::new(shared, config.encoder_addr)
    }

    #[tokio::test]
    async fn test_read_position() {
        let enc = encoder();
        let first = enc.read_position().await.unwrap();
        let second = enc.read_position().await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_arm_and_download() {
        let enc = encoder();
        enc.arm(25).await.unwrap();
        let samples = enc.download().await.unwrap();
        assert_eq!(samples.len(), 25);
    }

    #[tokio::test]
    async fn test_arm_rejects_bad_sample_counts() {
        let enc = encoder();
        assert!(enc.arm(0).await.is_err());
        assert!(enc.arm(300).await.is_err());
    }

    #[tokio::test]
    async fn test_status_idle() {
        let enc = encoder();
        assert_eq!(enc.status().await.unwrap(), Status::EncoderIdle);
    }
}
