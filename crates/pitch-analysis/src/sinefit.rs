//! Sinusoidal least-squares fitting.
//!
//! Model: `y(t) = amplitude * sin(frequency * t + phase) + mean`, with
//! frequency in rad/s. The initial guess seeds amplitude and mean from the
//! data directly and frequency from the dominant spectral bin; refinement
//! is damped Gauss-Newton on the analytic Jacobian.

use serde::Serialize;

use crate::error::AnalysisError;

/// Minimum points required to fit four parameters with any confidence.
const MIN_POINTS: usize = 8;

/// Refinement iteration cap.
const MAX_ITERATIONS: usize = 60;

/// Damping escalations per iteration before declaring the step stalled.
const MAX_DAMPING_STEPS: usize = 10;

/// Parameters of the sinusoidal model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SineParams {
    /// Peak deviation from the mean.
    pub amplitude: f64,

    /// Angular frequency in rad/s.
    pub frequency: f64,

    /// Phase offset in radians.
    pub phase: f64,

    /// Vertical offset.
    pub mean: f64,
}

impl SineParams {
    /// Evaluate the model at time `t`.
    pub fn eval(&self, t: f64) -> f64 {
        self.amplitude * (self.frequency * t + self.phase).sin() + self.mean
    }

    /// Frequency in Hz.
    pub fn frequency_hz(&self) -> f64 {
        self.frequency / (2.0 * std::f64::consts::PI)
    }

    fn from_array(p: [f64; 4]) -> Self {
        Self {
            amplitude: p[0],
            frequency: p[1],
            phase: p[2],
            mean: p[3],
        }
    }

    fn to_array(self) -> [f64; 4] {
        [self.amplitude, self.frequency, self.phase, self.mean]
    }
}

/// Result of a fit.
#[derive(Debug, Clone, Serialize)]
pub struct FitReport {
    /// Refined parameters (the initial guess if refinement stalled).
    pub params: SineParams,

    /// The seed the refinement started from.
    pub guess: SineParams,

    /// Gauss-Newton iterations run.
    pub iterations: usize,

    /// Root-mean-square residual of `params` against the data.
    pub residual_rms: f64,

    /// Whether refinement converged rather than stalling or hitting the
    /// iteration cap.
    pub converged: bool,
}

/// Estimate initial parameters from the data.
///
/// Mean from the average, amplitude from the peak above the mean, phase
/// zero, frequency from the dominant DFT bin (DC excluded) converted from
/// Hz to rad/s.
pub fn initial_guess(t: &[f64], y: &[f64]) -> Result<SineParams, AnalysisError> {
    validate(t, y)?;

    let n = y.len() as f64;
    let mean = y.iter().sum::<f64>() / n;
    let max = y.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let amplitude = max - mean;

    let freq_hz = dominant_frequency_hz(t, y, mean);
    Ok(SineParams {
        amplitude,
        frequency: 2.0 * std::f64::consts::PI * freq_hz,
        phase: 0.0,
        mean,
    })
}

/// Frequency (Hz) of the strongest non-DC spectral bin.
///
/// A direct DFT magnitude scan; capture lengths here are a few hundred
/// points, so O(n^2) is nowhere near mattering.
pub fn dominant_frequency_hz(t: &[f64], y: &[f64], mean: f64) -> f64 {
    let n = y.len();
    let dt = (t[n - 1] - t[0]) / (n as f64 - 1.0);

    let mut best_k = 1;
    let mut best_power = f64::NEG_INFINITY;
    for k in 1..n / 2 {
        let mut re = 0.0;
        let mut im = 0.0;
        for (j, &value) in y.iter().enumerate() {
            let angle = -2.0 * std::f64::consts::PI * (k * j) as f64 / n as f64;
            let centered = value - mean;
            re += centered * angle.cos();
            im += centered * angle.sin();
        }
        let power = re * re + im * im;
        if power > best_power {
            best_power = power;
            best_k = k;
        }
    }

    best_k as f64 / (n as f64 * dt)
}

/// Fit the sinusoidal model to `(t, y)`.
///
/// Refinement only ever accepts steps that reduce the residual, so the
/// returned parameters are never worse than the initial guess; if no step
/// is accepted at all the guess itself is returned, flagged unconverged.
pub fn fit(t: &[f64], y: &[f64]) -> Result<FitReport, AnalysisError> {
    let guess = initial_guess(t, y)?;
    tracing::debug!(
        amplitude = guess.amplitude,
        frequency = guess.frequency,
        mean = guess.mean,
        "Initial guess"
    );

    let mut p = guess.to_array();
    let mut sse = sum_squared_error(&p, t, y);
    let mut lambda = 1e-3;
    let mut iterations = 0;
    let mut converged = false;

    for _ in 0..MAX_ITERATIONS {
        iterations += 1;

        let (jtj, jtr) = normal_equations(&p, t, y);

        let mut accepted = false;
        for _ in 0..MAX_DAMPING_STEPS {
            let mut damped = jtj;
            for i in 0..4 {
                damped[i][i] += lambda * jtj[i][i].max(1e-12);
            }

            let Some(delta) = solve4(damped, jtr) else {
                lambda *= 10.0;
                continue;
            };

            let trial = [
                p[0] + delta[0],
                p[1] + delta[1],
                p[2] + delta[2],
                p[3] + delta[3],
            ];
            let trial_sse = sum_squared_error(&trial, t, y);
            if trial_sse.is_finite() && trial_sse < sse {
                let improvement = (sse - trial_sse) / sse.max(f64::MIN_POSITIVE);
                let step = delta.iter().map(|d| d * d).sum::<f64>().sqrt();
                p = trial;
                sse = trial_sse;
                lambda = (lambda / 10.0).max(1e-12);
                accepted = true;

                if improvement < 1e-12 || step < 1e-12 {
                    converged = true;
                }
                break;
            }
            lambda *= 10.0;
        }

        if !accepted {
            // No downhill step at any damping level: the surface is flat
            // here, which is as converged as this seed gets.
            converged = iterations > 1;
            break;
        }
        if converged {
            break;
        }
    }

    let params = if iterations == 1 && !converged && sse >= sum_squared_error(&guess.to_array(), t, y)
    {
        tracing::warn!("Refinement made no progress, returning the initial guess");
        guess
    } else {
        SineParams::from_array(p)
    };

    let residual_rms = (sum_squared_error(&params.to_array(), t, y) / y.len() as f64).sqrt();
    if !converged {
        tracing::warn!(iterations, residual_rms, "Fit did not fully converge");
    }

    Ok(FitReport {
        params,
        guess,
        iterations,
        residual_rms,
        converged,
    })
}

/// Generate a noisy demo series with the reference parameters
/// (amplitude 3.0, frequency 1.15247 rad/s, phase 0.001, mean 0.5) over
/// one 2π-second window. `noise` is the uniform noise amplitude.
pub fn demo_series(n: usize, noise: f64, seed: u64) -> (Vec<f64>, Vec<f64>) {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let truth = SineParams {
        amplitude: 3.0,
        frequency: 1.15247,
        phase: 0.001,
        mean: 0.5,
    };

    let mut rng = StdRng::seed_from_u64(seed);
    let span = 2.0 * std::f64::consts::PI;
    let t: Vec<f64> = (0..n)
        .map(|i| span * i as f64 / (n as f64 - 1.0))
        .collect();
    let y: Vec<f64> = t
        .iter()
        .map(|&ti| truth.eval(ti) + rng.gen_range(-noise..=noise))
        .collect();
    (t, y)
}

fn validate(t: &[f64], y: &[f64]) -> Result<(), AnalysisError> {
    if t.len() != y.len() {
        return Err(AnalysisError::LengthMismatch {
            t: t.len(),
            y: y.len(),
        });
    }
    if y.len() < MIN_POINTS {
        return Err(AnalysisError::TooFewPoints {
            got: y.len(),
            need: MIN_POINTS,
        });
    }
    if t.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(AnalysisError::NonFinite);
    }

    let min = y.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = y.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if (max - min).abs() < 1e-12 {
        return Err(AnalysisError::ConstantSeries);
    }
    Ok(())
}

fn model(p: &[f64; 4], t: f64) -> f64 {
    p[0] * (p[1] * t + p[2]).sin() + p[3]
}

fn sum_squared_error(p: &[f64; 4], t: &[f64], y: &[f64]) -> f64 {
    t.iter()
        .zip(y)
        .map(|(&ti, &yi)| {
            let r = yi - model(p, ti);
            r * r
        })
        .sum()
}

/// Build JᵀJ and Jᵀr for the residual r = y - model.
fn normal_equations(p: &[f64; 4], t: &[f64], y: &[f64]) -> ([[f64; 4]; 4], [f64; 4]) {
    let mut jtj = [[0.0; 4]; 4];
    let mut jtr = [0.0; 4];

    for (&ti, &yi) in t.iter().zip(y) {
        let arg = p[1] * ti + p[2];
        let sin = arg.sin();
        let cos = arg.cos();

        // d(model)/d(amplitude, frequency, phase, mean)
        let grad = [sin, p[0] * ti * cos, p[0] * cos, 1.0];
        let residual = yi - (p[0] * sin + p[3]);

        for i in 0..4 {
            jtr[i] += grad[i] * residual;
            for j in 0..4 {
                jtj[i][j] += grad[i] * grad[j];
            }
        }
    }
    (jtj, jtr)
}

/// Solve a 4x4 system by Gaussian elimination with partial pivoting.
/// Returns None for a (numerically) singular matrix.
fn solve4(mut a: [[f64; 4]; 4], mut b: [f64; 4]) -> Option<[f64; 4]> {
    for col in 0..4 {
        let pivot_row = (col..4).max_by(|&i, &j| {
            a[i][col]
                .abs()
                .partial_cmp(&a[j][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if a[pivot_row][col].abs() < 1e-300 {
            return None;
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in col + 1..4 {
            let factor = a[row][col] / a[col][col];
            for k in col..4 {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0; 4];
    for row in (0..4).rev() {
        let mut sum = b[row];
        for k in row + 1..4 {
            sum -= a[row][k] * x[k];
        }
        x[row] = sum / a[row][row];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(params: &SineParams, n: usize, span: f64) -> (Vec<f64>, Vec<f64>) {
        let t: Vec<f64> = (0..n)
            .map(|i| span * i as f64 / (n as f64 - 1.0))
            .collect();
        let y: Vec<f64> = t.iter().map(|&ti| params.eval(ti)).collect();
        (t, y)
    }

    #[test]
    fn test_initial_guess_seeds_near_truth() {
        let truth = SineParams {
            amplitude: 3.0,
            frequency: 1.15247,
            phase: 0.001,
            mean: 0.5,
        };
        let (t, y) = series(&truth, 256, 2.0 * std::f64::consts::PI);
        let guess = initial_guess(&t, &y).unwrap();

        assert!((guess.mean - 0.5).abs() < 0.1);
        assert!((guess.amplitude - 3.0).abs() < 0.5);
        // Spectrum resolution for this window is ~1 rad/s per bin.
        assert!((guess.frequency - truth.frequency).abs() < 1.0);
    }

    #[test]
    fn test_fit_recovers_clean_parameters() {
        let truth = SineParams {
            amplitude: 3.0,
            frequency: 1.15247,
            phase: 0.001,
            mean: 0.5,
        };
        let (t, y) = series(&truth, 256, 2.0 * std::f64::consts::PI);
        let report = fit(&t, &y).unwrap();

        assert!((report.params.amplitude - truth.amplitude).abs() < 1e-3);
        assert!((report.params.frequency - truth.frequency).abs() < 1e-3);
        assert!((report.params.phase - truth.phase).abs() < 1e-2);
        assert!((report.params.mean - truth.mean).abs() < 1e-3);
        assert!(report.residual_rms < 1e-6);
    }

    #[test]
    fn test_fit_handles_noise() {
        let (t, y) = demo_series(256, 0.3, 42);
        let report = fit(&t, &y).unwrap();

        assert!((report.params.amplitude - 3.0).abs() < 0.15);
        assert!((report.params.frequency - 1.15247).abs() < 0.05);
        assert!((report.params.mean - 0.5).abs() < 0.1);
    }

    #[test]
    fn test_fit_never_worse_than_guess() {
        let (t, y) = demo_series(128, 1.0, 7);
        let report = fit(&t, &y).unwrap();

        let guess_sse = sum_squared_error(&report.guess.to_array(), &t, &y);
        let fit_sse = sum_squared_error(&report.params.to_array(), &t, &y);
        assert!(fit_sse <= guess_sse);
    }

    #[test]
    fn test_rejects_degenerate_inputs() {
        let t: Vec<f64> = (0..16).map(|i| i as f64).collect();

        let flat = vec![2.0; 16];
        assert!(matches!(
            fit(&t, &flat),
            Err(AnalysisError::ConstantSeries)
        ));

        let short_t = vec![0.0, 1.0, 2.0];
        let short_y = vec![0.0, 1.0, 0.0];
        assert!(matches!(
            fit(&short_t, &short_y),
            Err(AnalysisError::TooFewPoints { .. })
        ));

        let mut with_nan: Vec<f64> = (0..16).map(|i| (i as f64).sin()).collect();
        with_nan[3] = f64::NAN;
        assert!(matches!(fit(&t, &with_nan), Err(AnalysisError::NonFinite)));

        assert!(matches!(
            fit(&t, &[1.0]),
            Err(AnalysisError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_solve4_identity() {
        let mut a = [[0.0; 4]; 4];
        for (i, row) in a.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        let b = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(solve4(a, b).unwrap(), b);
    }

    #[test]
    fn test_solve4_singular() {
        let a = [[0.0; 4]; 4];
        let b = [1.0, 2.0, 3.0, 4.0];
        assert!(solve4(a, b).is_none());
    }

    #[test]
    fn test_frequency_hz_conversion() {
        let params = SineParams {
            amplitude: 1.0,
            frequency: 2.0 * std::f64::consts::PI,
            phase: 0.0,
            mean: 0.0,
        };
        assert!((params.frequency_hz() - 1.0).abs() < 1e-12);
    }
}
