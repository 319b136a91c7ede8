//! Run session state: captured data, the E-stop latch, reset semantics.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// State accumulated over one sitting at the rig.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    hostname: String,

    /// Panel-configured speed ceiling in rpm, if set.
    pub max_rpm: Option<f64>,

    /// Speed commanded by the most recent start, in Hz.
    pub last_speed_hz: f64,

    /// Captured HLFB duty samples (centi-percent).
    pub hlfb: Vec<i32>,

    /// Downloaded encoder counts.
    pub encoder: Vec<i32>,

    estop_engaged: bool,
}

impl Session {
    pub fn new() -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            hostname,
            max_rpm: None,
            last_speed_hz: 0.0,
            hlfb: Vec::new(),
            encoder: Vec::new(),
            estop_engaged: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Latch the E-stop.
    pub fn engage_estop(&mut self) {
        self.estop_engaged = true;
    }

    /// Release the latch. The motor stays stopped; only the panel
    /// re-enables.
    pub fn release_estop(&mut self) {
        self.estop_engaged = false;
    }

    pub fn estop_engaged(&self) -> bool {
        self.estop_engaged
    }

    /// Clear inputs and captured data. A latched E-stop survives reset.
    pub fn reset(&mut self) {
        self.max_rpm = None;
        self.last_speed_hz = 0.0;
        self.hlfb.clear();
        self.encoder.clear();
    }

    pub fn record_hlfb(&mut self, samples: Vec<i32>) {
        self.hlfb = samples;
    }

    pub fn record_encoder(&mut self, samples: Vec<i32>) {
        self.encoder = samples;
    }

    /// Serializable snapshot for status output.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            started_at: self.started_at,
            hostname: self.hostname.clone(),
            estop_engaged: self.estop_engaged,
            max_rpm: self.max_rpm,
            last_speed_hz: self.last_speed_hz,
            hlfb_samples: self.hlfb.len(),
            encoder_samples: self.encoder.len(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub hostname: String,
    pub estop_engaged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rpm: Option<f64>,
    pub last_speed_hz: f64,
    pub hlfb_samples: usize,
    pub encoder_samples: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_clean() {
        let session = Session::new();
        assert!(!session.estop_engaged());
        assert!(session.hlfb.is_empty());
        assert!(session.encoder.is_empty());
        assert!(session.max_rpm.is_none());
    }

    #[test]
    fn test_reset_preserves_estop_latch() {
        let mut session = Session::new();
        session.max_rpm = Some(3000.0);
        session.record_hlfb(vec![1, 2, 3]);
        session.engage_estop();

        session.reset();

        assert!(session.estop_engaged(), "reset must not release the latch");
        assert!(session.hlfb.is_empty());
        assert!(session.max_rpm.is_none());
    }

    #[test]
    fn test_release_estop() {
        let mut session = Session::new();
        session.engage_estop();
        session.release_estop();
        assert!(!session.estop_engaged());
    }

    #[test]
    fn test_snapshot_counts() {
        let mut session = Session::new();
        session.record_hlfb(vec![0; 50]);
        session.record_encoder(vec![0; 200]);
        session.last_speed_hz = 12.5;

        let snap = session.snapshot();
        assert_eq!(snap.hlfb_samples, 50);
        assert_eq!(snap.encoder_samples, 200);
        assert!((snap.last_speed_hz - 12.5).abs() < 1e-9);
    }
}
