//! Run CSV format: sectioned export and re-import.
//!
//! Layout, in order: an `Inputs` section (speed, sample count, date), a
//! `Data Collected` section with `Sample,Angle,HLFB` rows where the angle
//! column holds the encoder value or `Null`, and - when encoder data was
//! captured - an `Encoder Data` section repeating the counts on their own.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::AnalysisError;

/// One captured run, ready to write.
#[derive(Debug, Clone)]
pub struct RunRecord {
    /// Commanded operating speed in Hz.
    pub speed_hz: f64,

    /// When the run was saved.
    pub recorded_at: DateTime<Utc>,

    /// HLFB duty samples (centi-percent).
    pub hlfb: Vec<i32>,

    /// Encoder counts, when a capture was downloaded.
    pub encoder: Option<Vec<i32>>,
}

impl RunRecord {
    pub fn new(speed_hz: f64, hlfb: Vec<i32>, encoder: Option<Vec<i32>>) -> Self {
        Self {
            speed_hz,
            recorded_at: Utc::now(),
            hlfb,
            encoder,
        }
    }
}

/// A run read back from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedRun {
    /// Speed from the Inputs section.
    pub speed_hz: f64,

    /// HLFB column of the Data Collected section.
    pub hlfb: Vec<f64>,

    /// Angle column; `None` where the file says `Null`.
    pub angle: Vec<Option<f64>>,
}

impl LoadedRun {
    /// Evenly spaced timebase for this run's samples.
    pub fn timebase(&self, sample_rate_hz: f64) -> Vec<f64> {
        (0..self.hlfb.len())
            .map(|i| i as f64 / sample_rate_hz)
            .collect()
    }

    /// Angle column as a dense series, if every row has a value.
    pub fn angle_series(&self) -> Option<Vec<f64>> {
        self.angle.iter().copied().collect()
    }
}

/// Write a run to `path`.
pub fn save(path: &Path, run: &RunRecord) -> Result<(), AnalysisError> {
    let file = File::create(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => {
            AnalysisError::PermissionDenied(path.display().to_string())
        }
        _ => AnalysisError::Io(e.to_string()),
    })?;
    let mut writer = csv::Writer::from_writer(file);

    let samples = run.hlfb.len();
    let date = run.recorded_at.format("%Y-%m-%d %H:%M:%S").to_string();

    writer.write_record(["Inputs", "", ""])?;
    writer.write_record(["Speed (Hz)", "Samples", "Date"])?;
    writer.write_record([run.speed_hz.to_string(), samples.to_string(), date])?;
    writer.write_record(["", "", ""])?;

    writer.write_record(["Data Collected", "", ""])?;
    writer.write_record(["Sample", "Angle", "HLFB"])?;
    for (i, &duty) in run.hlfb.iter().enumerate() {
        let angle = match &run.encoder {
            Some(counts) => counts
                .get(i)
                .map(|c| c.to_string())
                .unwrap_or_else(|| "Null".to_string()),
            None => "Null".to_string(),
        };
        writer.write_record([(i + 1).to_string(), angle, duty.to_string()])?;
    }

    if let Some(counts) = &run.encoder {
        writer.write_record(["", "", ""])?;
        writer.write_record(["Encoder Data", "", ""])?;
        writer.write_record(["Sample Index", "Encoder Value", ""])?;
        for (i, &count) in counts.iter().enumerate() {
            writer.write_record([(i + 1).to_string(), count.to_string(), String::new()])?;
        }
    }

    writer.flush().map_err(|e| AnalysisError::Io(e.to_string()))?;
    tracing::info!(path = %path.display(), samples, "Run saved to CSV");
    Ok(())
}

/// Read the Inputs and Data Collected sections back from `path`.
pub fn load(path: &Path) -> Result<LoadedRun, AnalysisError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let rows: Vec<Vec<String>> = reader
        .records()
        .map(|r| r.map(|rec| rec.iter().map(str::to_string).collect()))
        .collect::<Result<_, _>>()?;

    let speed_header = rows
        .iter()
        .position(|row| row.first().map(String::as_str) == Some("Speed (Hz)"))
        .ok_or_else(|| AnalysisError::Malformed("missing Inputs section".to_string()))?;
    let speed_hz = rows
        .get(speed_header + 1)
        .and_then(|row| row.first())
        .and_then(|cell| cell.parse::<f64>().ok())
        .ok_or_else(|| AnalysisError::Malformed("unreadable speed value".to_string()))?;

    let data_header = rows
        .iter()
        .position(|row| row.first().map(String::as_str) == Some("Data Collected"))
        .ok_or_else(|| AnalysisError::Malformed("missing Data Collected section".to_string()))?;

    let mut hlfb = Vec::new();
    let mut angle = Vec::new();
    // Skip the section title and the Sample/Angle/HLFB header.
    for row in rows.iter().skip(data_header + 2) {
        let first = row.first().map(String::as_str).unwrap_or("");
        if first.is_empty() || first == "Encoder Data" {
            break;
        }
        let angle_cell = row.get(1).map(String::as_str).unwrap_or("Null");
        let hlfb_cell = row
            .get(2)
            .ok_or_else(|| AnalysisError::Malformed(format!("row {first} has no HLFB value")))?;

        angle.push(match angle_cell {
            "Null" | "null" | "" => None,
            value => Some(value.parse::<f64>().map_err(|_| {
                AnalysisError::Malformed(format!("bad angle value: {value}"))
            })?),
        });
        hlfb.push(hlfb_cell.parse::<f64>().map_err(|_| {
            AnalysisError::Malformed(format!("bad HLFB value: {hlfb_cell}"))
        })?);
    }

    if hlfb.is_empty() {
        return Err(AnalysisError::Malformed(
            "Data Collected section is empty".to_string(),
        ));
    }

    Ok(LoadedRun {
        speed_hz,
        hlfb,
        angle,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_encoder() -> RunRecord {
        RunRecord::new(12.5, vec![4500, 5200, 5500], Some(vec![100, 204, 310]))
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.csv");

        save(&path, &record_with_encoder()).unwrap();
        let loaded = load(&path).unwrap();

        assert!((loaded.speed_hz - 12.5).abs() < 1e-9);
        assert_eq!(loaded.hlfb, vec![4500.0, 5200.0, 5500.0]);
        assert_eq!(
            loaded.angle,
            vec![Some(100.0), Some(204.0), Some(310.0)]
        );
        assert_eq!(loaded.angle_series(), Some(vec![100.0, 204.0, 310.0]));
    }

    #[test]
    fn test_save_without_encoder_writes_null_angles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.csv");

        let record = RunRecord::new(5.0, vec![5000, 5100], None);
        save(&path, &record).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Null"));
        assert!(!text.contains("Encoder Data"));

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.angle, vec![None, None]);
        assert_eq!(loaded.angle_series(), None);
    }

    #[test]
    fn test_sections_present_in_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.csv");
        save(&path, &record_with_encoder()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Inputs"));
        assert!(text.contains("Speed (Hz),Samples,Date"));
        assert!(text.contains("Data Collected"));
        assert!(text.contains("Sample,Angle,HLFB"));
        assert!(text.contains("Encoder Data"));
        assert!(text.contains("Sample Index,Encoder Value"));
    }

    #[test]
    fn test_timebase_uses_sample_rate() {
        let run = LoadedRun {
            speed_hz: 1.0,
            hlfb: vec![0.0; 3],
            angle: vec![None; 3],
        };
        let t = run.timebase(480.0);
        assert_eq!(t.len(), 3);
        assert!((t[1] - 1.0 / 480.0).abs() < 1e-12);
    }

    #[test]
    fn test_load_rejects_non_run_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.csv");
        std::fs::write(&path, "a,b,c\n1,2,3\n").unwrap();

        assert!(matches!(
            load(&path),
            Err(AnalysisError::Malformed(_))
        ));
    }

    #[test]
    fn test_load_encoder_shorter_than_hlfb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.csv");

        let record = RunRecord::new(3.0, vec![1, 2, 3], Some(vec![10]));
        save(&path, &record).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.angle, vec![Some(10.0), None, None]);
    }
}
