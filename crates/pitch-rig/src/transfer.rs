//! Chunked capture download shared by both peripherals.

use std::time::Duration;

use pitch_proto::{decode_capture_status, decode_chunk, decode_samples, CaptureState, Frame,
    FRAME_LEN};

use crate::bus::{self, SharedBus};
use crate::error::{RigError, RigResult};

/// Polls a peripheral reporting CAPTURING this many times before giving up.
const BUSY_RETRIES: u32 = 5;

/// Delay between busy polls.
const BUSY_DELAY: Duration = Duration::from_millis(100);

/// Delay after a chunk request, giving the peripheral time to fill its
/// reply buffer.
const CHUNK_DELAY: Duration = Duration::from_millis(5);

/// Download a complete capture buffer from the device at `addr`.
///
/// Reads the status header, waits out a still-capturing peripheral, then
/// walks the buffer four bytes at a time and decodes it as i32 samples.
/// Partial data is never returned: a failed chunk aborts the download.
pub(crate) async fn download(shared: &SharedBus, addr: u16) -> RigResult<Vec<i32>> {
    let mut busy_polls = 0;
    let total_bytes = loop {
        let block = bus::lock(shared).read_block(addr, 0, FRAME_LEN)?;
        match decode_capture_status(&block)? {
            CaptureState::Ready { total_bytes } => break total_bytes,
            CaptureState::Capturing if busy_polls < BUSY_RETRIES => {
                busy_polls += 1;
                tracing::debug!(addr, busy_polls, "Capture not ready, polling again");
                tokio::time::sleep(BUSY_DELAY).await;
            }
            CaptureState::Capturing => return Err(RigError::CaptureBusy),
        }
    };

    tracing::debug!(addr, total_bytes, "Capture buffer ready");

    let mut collected: Vec<u8> = Vec::with_capacity(total_bytes as usize);
    let mut offset: u16 = 0;
    while (offset as usize) < total_bytes as usize {
        bus::lock(shared).write_block(addr, 0, Frame::read_chunk(offset).bytes())?;
        tokio::time::sleep(CHUNK_DELAY).await;

        let block = bus::lock(shared).read_block(addr, 0, FRAME_LEN)?;
        let chunk = decode_chunk(&block)
            .map_err(|source| RigError::ChunkFailed { offset, source })?;
        collected.extend_from_slice(&chunk);
        offset += 4;
    }

    collected.truncate(total_bytes as usize);
    Ok(decode_samples(&collected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::bus::sim::SimBus;
    use crate::config::RigConfig;

    #[tokio::test]
    async fn test_download_rides_out_settle_poll() {
        let config = RigConfig::default();
        let mut sim = SimBus::new(&config);
        {
            use crate::bus::I2cBus;
            sim.write_block(config.encoder_addr, 0, Frame::record(12).unwrap().bytes())
                .unwrap();
        }
        let shared: SharedBus = Arc::new(Mutex::new(sim));

        let samples = download(&shared, config.encoder_addr).await.unwrap();
        assert_eq!(samples.len(), 12);
    }

    #[tokio::test]
    async fn test_download_without_capture_fails() {
        let config = RigConfig::default();
        let sim = SimBus::new(&config);
        let shared: SharedBus = Arc::new(Mutex::new(sim));

        // Idle encoder reports ENCODER_IDLE, which is not a capture status.
        let err = download(&shared, config.encoder_addr).await.unwrap_err();
        assert!(matches!(err, RigError::Proto(_)));
    }
}
