//! Noise smoothing filters.
//!
//! All three keep the input length. Savitzky-Golay parameter combinations
//! the filter cannot honour fall back to the unfiltered signal. Only a
//! Gaussian kernel wider than the signal can support is an error.

use super::Correction;
use super::linalg::{fit_polynomial, savgol_coefficients};
use crate::error::PeakError;

/// Gaussian kernel half-width in standard deviations.
const GAUSSIAN_TRUNCATE: f64 = 4.0;

// ---------------------------------------------------------------------------
// Moving average
// ---------------------------------------------------------------------------

/// Centred boxcar average.
///
/// The window is clamped to the signal length and promoted to the next odd
/// value. Samples beyond either end count as zero, so the first and last
/// `window / 2` outputs are attenuated toward zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingAverage {
    pub window_size: i64,
}

impl MovingAverage {
    /// Window actually used for a signal of `len` samples.
    pub fn effective_window(&self, len: usize) -> usize {
        let mut w = self.window_size.min(len as i64).max(0) as usize;
        if w % 2 == 0 {
            w += 1;
        }
        w
    }

    pub fn smooth(&self, signal: &[f64]) -> Vec<f64> {
        if self.window_size < 1 {
            return signal.to_vec();
        }
        let n = signal.len();
        let w = self.effective_window(n);
        let half = w / 2;
        let scale = 1.0 / w as f64;

        (0..n)
            .map(|i| {
                let lo = i.saturating_sub(half);
                let hi = (i + half).min(n.saturating_sub(1));
                signal[lo..=hi].iter().sum::<f64>() * scale
            })
            .collect()
    }
}

impl Correction for MovingAverage {
    fn apply(&self, _time: &[f64], signal: &[f64]) -> Result<Vec<f64>, PeakError> {
        Ok(self.smooth(signal))
    }
}

// ---------------------------------------------------------------------------
// Savitzky-Golay
// ---------------------------------------------------------------------------

/// Local least-squares polynomial smoothing.
///
/// Parameter clamping, in order:
/// 1. a window longer than the signal shrinks to the signal length (minus
///    one if that is even)
/// 2. if `window < poly_order + 2`, `poly_order` drops to `max(1, window - 2)`
/// 3. an even window is bumped to the next odd value
///
/// The first and last `window / 2` samples are replaced by a polynomial fit
/// over the first/last full window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SavitzkyGolay {
    pub window_size: i64,
    pub poly_order: i64,
}

impl SavitzkyGolay {
    /// `(window, poly_order)` after clamping for a signal of `len` samples.
    pub fn effective_params(&self, len: usize) -> (i64, i64) {
        let n = len as i64;
        let mut window = self.window_size;
        let mut order = self.poly_order;

        if n < window {
            window = if n % 2 == 1 { n } else { n - 1 };
        }
        if window < order + 2 {
            order = (window - 2).max(1);
        }
        if window % 2 == 0 {
            window += 1;
        }
        (window, order)
    }

    pub fn smooth(&self, signal: &[f64]) -> Vec<f64> {
        let (window, order) = self.effective_params(signal.len());
        match savgol_filter(signal, window, order) {
            Ok(out) => {
                log::debug!("savitzky-golay: window {window}, order {order}");
                out
            }
            Err(e) => {
                log::debug!("savitzky-golay ({window}, {order}) skipped: {e}");
                signal.to_vec()
            }
        }
    }
}

impl Correction for SavitzkyGolay {
    fn apply(&self, _time: &[f64], signal: &[f64]) -> Result<Vec<f64>, PeakError> {
        Ok(self.smooth(signal))
    }
}

fn savgol_filter(signal: &[f64], window: i64, order: i64) -> Result<Vec<f64>, PeakError> {
    if window < 1 || order < 0 {
        return Err(PeakError::numerical(format!(
            "invalid window_length {window} / polyorder {order}"
        )));
    }
    let (window, order) = (window as usize, order as usize);
    let n = signal.len();
    if window > n {
        return Err(PeakError::numerical(
            "window_length must be less than or equal to the size of x",
        ));
    }

    let coeffs = savgol_coefficients(window, order)?;
    let half = window / 2;
    let mut out = signal.to_vec();

    for i in half..n - half {
        out[i] = coeffs
            .iter()
            .zip(&signal[i - half..=i + half])
            .map(|(c, x)| c * x)
            .sum();
    }

    // Edges: evaluate the polynomial fitted to the first/last full window.
    if half > 0 {
        let positions: Vec<f64> = (0..window).map(|j| j as f64).collect();

        let head = fit_polynomial(&positions, &signal[..window], order)?;
        out[..half].copy_from_slice(&head[..half]);

        let tail = fit_polynomial(&positions, &signal[n - window..], order)?;
        out[n - half..].copy_from_slice(&tail[window - half..]);
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Gaussian
// ---------------------------------------------------------------------------

/// Convolution with a normalised Gaussian kernel truncated at 4σ.
///
/// Borders are extended by half-sample symmetric reflection
/// (`d c b a | a b c d | d c b a`). `sigma <= 0` leaves the signal as is.
/// A kernel radius beyond [`MAX_RADIUS_PER_SAMPLE`] times the signal length
/// (and at least [`MIN_RADIUS_LIMIT`]) is a numerical failure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianSmooth {
    pub sigma: f64,
}

/// Largest kernel radius allowed per signal sample.
pub const MAX_RADIUS_PER_SAMPLE: usize = 16;

/// Radius always accepted, however short the signal.
pub const MIN_RADIUS_LIMIT: usize = 256;

impl GaussianSmooth {
    /// Kernel for a signal of `len` samples; the identity for `sigma <= 0`.
    pub fn kernel(&self, len: usize) -> Result<Vec<f64>, PeakError> {
        if !(self.sigma > 0.0) {
            return Ok(vec![1.0]);
        }
        let radius = GAUSSIAN_TRUNCATE * self.sigma + 0.5;
        let limit = (MAX_RADIUS_PER_SAMPLE * len).max(MIN_RADIUS_LIMIT);
        if !radius.is_finite() || radius >= limit as f64 + 1.0 {
            return Err(PeakError::numerical(format!(
                "gaussian sigma {} is too wide for {len} samples",
                self.sigma
            )));
        }
        let radius = radius as usize;
        let weights: Vec<f64> = (0..=2 * radius)
            .map(|j| {
                let x = j as f64 - radius as f64;
                (-0.5 * x * x / (self.sigma * self.sigma)).exp()
            })
            .collect();
        let total: f64 = weights.iter().sum();
        Ok(weights.into_iter().map(|w| w / total).collect())
    }

    pub fn smooth(&self, signal: &[f64]) -> Result<Vec<f64>, PeakError> {
        if !(self.sigma > 0.0) || signal.is_empty() {
            return Ok(signal.to_vec());
        }
        let n = signal.len();
        let kernel = self.kernel(n)?;
        let radius = (kernel.len() / 2) as isize;

        Ok((0..n as isize)
            .map(|i| {
                kernel
                    .iter()
                    .enumerate()
                    .map(|(j, w)| w * signal[reflect(i + j as isize - radius, n)])
                    .sum()
            })
            .collect())
    }
}

impl Correction for GaussianSmooth {
    fn apply(&self, _time: &[f64], signal: &[f64]) -> Result<Vec<f64>, PeakError> {
        self.smooth(signal)
    }
}

/// Map any index onto `0..n` by half-sample symmetric reflection.
fn reflect(i: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let m = i.rem_euclid(period);
    if m < n as isize {
        m as usize
    } else {
        (period - 1 - m) as usize
    }
}
