//! Analysis error types.

use thiserror::Error;

/// Errors raised by fitting and CSV handling.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Not enough points to fit four parameters.
    #[error("Too few data points: got {got}, need at least {need}")]
    TooFewPoints { got: usize, need: usize },

    /// Time and value series differ in length.
    #[error("Series length mismatch: {t} time points, {y} values")]
    LengthMismatch { t: usize, y: usize },

    /// Data contains NaN or infinity.
    #[error("Series contains non-finite values")]
    NonFinite,

    /// A flat series has no frequency to estimate.
    #[error("Series is constant; nothing to fit")]
    ConstantSeries,

    /// The run file does not have the expected sections.
    #[error("Malformed run file: {0}")]
    Malformed(String),

    /// Permission refused for the output file.
    #[error("Permission denied writing {0}; close the file if it is open elsewhere")]
    PermissionDenied(String),

    /// CSV layer error.
    #[error("CSV error: {0}")]
    Csv(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<csv::Error> for AnalysisError {
    fn from(e: csv::Error) -> Self {
        AnalysisError::Csv(e.to_string())
    }
}

impl From<std::io::Error> for AnalysisError {
    fn from(e: std::io::Error) -> Self {
        AnalysisError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnalysisError::TooFewPoints { got: 3, need: 8 };
        assert_eq!(err.to_string(), "Too few data points: got 3, need at least 8");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: AnalysisError = io_err.into();
        assert!(matches!(err, AnalysisError::Io(_)));
    }
}
