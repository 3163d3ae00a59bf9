//! Baseline (drift) removal.
//!
//! Each method estimates a baseline over the window it is handed and
//! returns `signal - baseline`.

use super::Correction;
use super::linalg::{BandedSpd, fit_polynomial};
use crate::error::PeakError;

// ---------------------------------------------------------------------------
// Linear
// ---------------------------------------------------------------------------

/// Straight line through the first and last sample of the window.
///
/// When the first and last time values coincide the line is undefined and
/// every corrected sample is NaN, which integrates to an area of zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LinearBaseline;

impl Correction for LinearBaseline {
    fn apply(&self, time: &[f64], signal: &[f64]) -> Result<Vec<f64>, PeakError> {
        check_lengths(time, signal)?;
        let (Some(&t0), Some(&t1)) = (time.first(), time.last()) else {
            return Err(PeakError::numerical("linear baseline needs at least one sample"));
        };
        let (y0, y1) = (signal[0], signal[signal.len() - 1]);
        let dt = t1 - t0;
        if dt == 0.0 {
            log::debug!("linear baseline: first and last time values are equal ({t0})");
            return Ok(vec![f64::NAN; signal.len()]);
        }

        let slope = (y1 - y0) / dt;
        let intercept = y0 - slope * t0;
        Ok(time
            .iter()
            .zip(signal)
            .map(|(t, y)| y - (slope * t + intercept))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Polynomial
// ---------------------------------------------------------------------------

/// Least-squares polynomial through the whole window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolynomialBaseline {
    pub degree: usize,
}

impl PolynomialBaseline {
    /// Highest degree accepted; the fit is ill-conditioned long before this.
    pub const MAX_DEGREE: usize = 32;
}

impl Correction for PolynomialBaseline {
    fn apply(&self, time: &[f64], signal: &[f64]) -> Result<Vec<f64>, PeakError> {
        check_lengths(time, signal)?;
        if self.degree > Self::MAX_DEGREE {
            return Err(PeakError::numerical(format!(
                "polynomial baseline degree {} exceeds {}",
                self.degree,
                Self::MAX_DEGREE
            )));
        }
        let fitted = fit_polynomial(time, signal, self.degree)?;
        Ok(signal.iter().zip(fitted).map(|(y, b)| y - b).collect())
    }
}

// ---------------------------------------------------------------------------
// Asymmetric least squares
// ---------------------------------------------------------------------------

/// Asymmetric least squares (Eilers & Boelens) baseline.
///
/// Minimises
///
/// ```text
/// Σ wᵢ (yᵢ - zᵢ)² + λ Σ (Δ² z)ᵢ²
/// ```
///
/// by solving `(W + λ D Dᵀ) z = W y` a fixed number of times, re-weighting
/// after each solve: samples above the current baseline get weight `p`,
/// all others `1 - p`. With small `p` the baseline hugs the lower envelope.
/// There is no convergence test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlsBaseline {
    /// Smoothness penalty λ.
    pub lambda: f64,
    /// Asymmetry p, typically around 0.01.
    pub p: f64,
    /// Number of solve/re-weight rounds.
    pub iterations: usize,
}

impl AlsBaseline {
    /// Estimate the baseline `z` itself.
    pub fn baseline(&self, signal: &[f64]) -> Result<Vec<f64>, PeakError> {
        let n = signal.len();
        if n < 3 {
            return Err(PeakError::numerical(format!(
                "ALS baseline needs at least 3 samples, got {n}"
            )));
        }
        if self.iterations == 0 {
            return Err(PeakError::numerical("ALS baseline needs at least one iteration"));
        }

        let penalty = second_difference_penalty(n, self.lambda);
        let mut weights = vec![1.0; n];
        let mut z = Vec::new();

        for _ in 0..self.iterations {
            let mut system = penalty.clone();
            for (i, &w) in weights.iter().enumerate() {
                system.add(i, i, w);
            }
            let rhs: Vec<f64> = weights.iter().zip(signal).map(|(w, y)| w * y).collect();
            z = system.solve(&rhs)?;

            for ((w, &y), &b) in weights.iter_mut().zip(signal).zip(&z) {
                *w = if y > b { self.p } else { 1.0 - self.p };
            }
        }

        Ok(z)
    }
}

impl Correction for AlsBaseline {
    fn apply(&self, time: &[f64], signal: &[f64]) -> Result<Vec<f64>, PeakError> {
        check_lengths(time, signal)?;
        let z = self.baseline(signal)?;
        Ok(signal.iter().zip(z).map(|(y, b)| y - b).collect())
    }
}

/// `λ D Dᵀ` for the `n × (n-2)` second-difference operator `D`, whose
/// columns are `[1, -2, 1]` shifted down one row at a time.
fn second_difference_penalty(n: usize, lambda: f64) -> BandedSpd {
    const STENCIL: [f64; 3] = [1.0, -2.0, 1.0];
    let mut band = BandedSpd::zeros(n, 2);
    for col in 0..n.saturating_sub(2) {
        for a in 0..3 {
            for b in 0..=a {
                band.add(col + a, col + b, lambda * STENCIL[a] * STENCIL[b]);
            }
        }
    }
    band
}

fn check_lengths(time: &[f64], signal: &[f64]) -> Result<(), PeakError> {
    if time.len() != signal.len() {
        return Err(PeakError::LengthMismatch {
            time: time.len(),
            signal: signal.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use nalgebra::{DMatrix, DVector};

    use super::*;

    fn axis(n: usize, step: f64) -> Vec<f64> {
        (0..n).map(|i| i as f64 * step).collect()
    }

    #[test]
    fn linear_baseline_flattens_a_line() {
        let time = axis(200, 0.05);
        let signal: Vec<f64> = time.iter().map(|t| 2.0 * t + 1.0).collect();
        let out = LinearBaseline.apply(&time, &signal).unwrap();
        for v in out {
            assert_abs_diff_eq!(v, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn linear_baseline_zeroes_endpoints() {
        let time = [1.0, 2.0, 3.0, 4.0];
        let signal = [5.0, 9.0, 8.0, 2.0];
        let out = LinearBaseline.apply(&time, &signal).unwrap();
        assert_abs_diff_eq!(out[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out[3], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out[1], 9.0 - 4.0, epsilon = 1e-12);
    }

    #[test]
    fn linear_baseline_degenerate_time_is_nan() {
        let out = LinearBaseline.apply(&[1.0, 1.0], &[0.0, 1.0]).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn polynomial_baseline_removes_quadratic_drift() {
        let time = axis(50, 0.2);
        let signal: Vec<f64> = time.iter().map(|t| 0.5 * t * t - t + 3.0).collect();
        let out = PolynomialBaseline { degree: 2 }.apply(&time, &signal).unwrap();
        for v in out {
            assert_abs_diff_eq!(v, 0.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn polynomial_baseline_rejects_huge_degree() {
        let time = axis(10, 1.0);
        let signal = vec![1.0; 10];
        let err = PolynomialBaseline { degree: 1_000_000_000 }
            .apply(&time, &signal)
            .unwrap_err();
        assert!(matches!(err, PeakError::Numerical(_)));
        assert!(PolynomialBaseline { degree: PolynomialBaseline::MAX_DEGREE }
            .apply(&time, &signal)
            .is_ok());
    }

    #[test]
    fn penalty_matches_dense_product() {
        let n = 7;
        let lambda = 3.0;
        let band = second_difference_penalty(n, lambda);

        let d = DMatrix::from_fn(n, n - 2, |r, c| match r as isize - c as isize {
            0 => 1.0,
            1 => -2.0,
            2 => 1.0,
            _ => 0.0,
        });
        let dense = (&d * d.transpose()) * lambda;
        for i in 0..n {
            for j in 0..n {
                assert_abs_diff_eq!(band.get(i, j), dense[(i, j)], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn als_single_iteration_matches_dense_solve() {
        let signal = [1.0, 3.0, 2.0, 5.0, 4.0, 4.5, 2.0, 1.0];
        let n = signal.len();
        let als = AlsBaseline {
            lambda: 10.0,
            p: 0.01,
            iterations: 1,
        };
        let z = als.baseline(&signal).unwrap();

        let d = DMatrix::from_fn(n, n - 2, |r, c| match r as isize - c as isize {
            0 => 1.0,
            1 => -2.0,
            2 => 1.0,
            _ => 0.0,
        });
        let a = DMatrix::identity(n, n) + (&d * d.transpose()) * 10.0;
        let expected = a.lu().solve(&DVector::from_column_slice(&signal)).unwrap();
        for (got, e) in z.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(got, e, epsilon = 1e-9);
        }
    }

    #[test]
    fn als_tracks_lower_envelope() {
        // Flat baseline at 1.0 with a tall peak in the middle.
        let signal: Vec<f64> = (0..200)
            .map(|i| {
                let x = i as f64 - 100.0;
                1.0 + 10.0 * (-x * x / 50.0).exp()
            })
            .collect();
        let als = AlsBaseline {
            lambda: 1e5,
            p: 0.01,
            iterations: 10,
        };
        let z = als.baseline(&signal).unwrap();
        // Under the peak the baseline stays far below the signal.
        assert!(z[100] < 3.0, "baseline under peak = {}", z[100]);
        assert_abs_diff_eq!(z[0], 1.0, epsilon = 0.5);

        let time = axis(200, 1.0);
        let corrected = als.apply(&time, &signal).unwrap();
        assert!(corrected[100] > 8.0);
    }

    #[test]
    fn als_needs_three_samples() {
        let als = AlsBaseline {
            lambda: 1e5,
            p: 0.01,
            iterations: 10,
        };
        assert!(als.apply(&[0.0, 1.0], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let err = PolynomialBaseline { degree: 1 }
            .apply(&[0.0, 1.0, 2.0], &[1.0, 2.0])
            .unwrap_err();
        assert_eq!(err, PeakError::LengthMismatch { time: 3, signal: 2 });
    }
}
