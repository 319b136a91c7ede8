//! Motor command parameters and their wire representation.

use serde::{Deserialize, Serialize};

use crate::error::ProtoError;

/// Speed waveform the motor controller runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    /// Sinusoidal speed profile.
    Sine,
    /// Square speed profile.
    Square,
    /// Triangle speed profile.
    Triangle,
}

impl Waveform {
    /// Wire byte for this waveform.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Sine => 1,
            Self::Square => 2,
            Self::Triangle => 3,
        }
    }
}

impl TryFrom<u8> for Waveform {
    type Error = ProtoError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            1 => Ok(Self::Sine),
            2 => Ok(Self::Square),
            3 => Ok(Self::Triangle),
            other => Err(ProtoError::UnknownWaveform(other)),
        }
    }
}

impl std::fmt::Display for Waveform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sine => write!(f, "sine"),
            Self::Square => write!(f, "square"),
            Self::Triangle => write!(f, "triangle"),
        }
    }
}

impl std::str::FromStr for Waveform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sine" | "1" => Ok(Self::Sine),
            "square" | "2" => Ok(Self::Square),
            "triangle" | "3" => Ok(Self::Triangle),
            other => Err(format!("unknown waveform: {other}")),
        }
    }
}

/// Motor rotation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Clockwise.
    Cw,
    /// Counter-clockwise.
    Ccw,
}

impl Direction {
    /// Wire byte for this direction.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Cw => 0,
            Self::Ccw => 1,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cw => write!(f, "cw"),
            Self::Ccw => write!(f, "ccw"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cw" | "clockwise" => Ok(Self::Cw),
            "ccw" | "counterclockwise" => Ok(Self::Ccw),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

/// Full parameter set for a motor start command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotorCommand {
    /// Speed waveform.
    pub waveform: Waveform,

    /// Operating speed in Hz (revolutions per second).
    pub speed_hz: f64,

    /// Ramp multiplier controlling time to full speed (0..=255).
    pub ramp: u8,

    /// Rotation direction.
    pub direction: Direction,
}

impl MotorCommand {
    /// Operating speed as wire centihertz.
    ///
    /// The wire carries speed as a little-endian u16 in units of 0.01 Hz.
    pub fn speed_centihertz(&self) -> Result<u16, ProtoError> {
        if !self.speed_hz.is_finite() || self.speed_hz < 0.0 {
            return Err(ProtoError::SpeedOutOfRange(self.speed_hz));
        }
        let centi = (self.speed_hz * 100.0).round();
        if centi > f64::from(u16::MAX) {
            return Err(ProtoError::SpeedOutOfRange(self.speed_hz));
        }
        Ok(centi as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waveform_bytes_round_trip() {
        for wf in [Waveform::Sine, Waveform::Square, Waveform::Triangle] {
            assert_eq!(Waveform::try_from(wf.as_byte()).unwrap(), wf);
        }
        assert!(Waveform::try_from(0).is_err());
        assert!(Waveform::try_from(4).is_err());
    }

    #[test]
    fn test_waveform_from_str() {
        assert_eq!("sine".parse::<Waveform>().unwrap(), Waveform::Sine);
        assert_eq!("2".parse::<Waveform>().unwrap(), Waveform::Square);
        assert!("sawtooth".parse::<Waveform>().is_err());
    }

    #[test]
    fn test_direction_from_str() {
        assert_eq!("cw".parse::<Direction>().unwrap(), Direction::Cw);
        assert_eq!("CCW".parse::<Direction>().unwrap(), Direction::Ccw);
    }

    #[test]
    fn test_speed_centihertz() {
        let cmd = MotorCommand {
            waveform: Waveform::Sine,
            speed_hz: 12.345,
            ramp: 50,
            direction: Direction::Cw,
        };
        assert_eq!(cmd.speed_centihertz().unwrap(), 1235);
    }

    #[test]
    fn test_speed_out_of_range() {
        let mut cmd = MotorCommand {
            waveform: Waveform::Sine,
            speed_hz: 700.0,
            ramp: 0,
            direction: Direction::Cw,
        };
        assert!(cmd.speed_centihertz().is_err());

        cmd.speed_hz = -1.0;
        assert!(cmd.speed_centihertz().is_err());

        cmd.speed_hz = f64::NAN;
        assert!(cmd.speed_centihertz().is_err());
    }
}
