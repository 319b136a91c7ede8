//! Pitch Master data analysis.
//!
//! Offline processing of captured rig data:
//! - `sinefit`: sinusoidal least-squares fitting with a spectrum-seeded
//!   initial guess
//! - `export`: the sectioned CSV run format, writer and reader

pub mod error;
pub mod export;
pub mod sinefit;

pub use error::AnalysisError;
pub use export::{LoadedRun, RunRecord};
pub use sinefit::{fit, initial_guess, FitReport, SineParams};
