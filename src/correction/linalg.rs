//! Small linear-algebra kernels used by the correction methods.
//!
//! - [`BandedSpd`]: symmetric positive-definite band matrix with an in-place
//!   Cholesky solve, O(n·b²) for half-bandwidth `b`. ALS builds a
//!   pentadiagonal system (`b = 2`) of the same length as the window, so a
//!   dense solve would be cubic in the window length.
//! - [`fit_polynomial`]: least-squares polynomial fit through SVD.
//! - [`savgol_coefficients`]: centre-point Savitzky-Golay smoothing weights.

use nalgebra::{DMatrix, DVector};

use crate::error::PeakError;

/// Absolute cutoff: singular values at or below this are treated as zero.
/// Inputs are centred and scaled first, so the matrices stay near unit norm.
const SVD_EPS: f64 = 1e-12;

// ---------------------------------------------------------------------------
// Banded symmetric positive-definite matrix
// ---------------------------------------------------------------------------

/// Lower band of a symmetric matrix; `A[i][j]` for `i - half_bw <= j <= i`.
#[derive(Debug, Clone)]
pub struct BandedSpd {
    n: usize,
    half_bw: usize,
    /// Row-major: `data[i * (half_bw + 1) + (i - j)]`.
    data: Vec<f64>,
}

impl BandedSpd {
    pub fn zeros(n: usize, half_bw: usize) -> Self {
        BandedSpd {
            n,
            half_bw,
            data: vec![0.0; n * (half_bw + 1)],
        }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    fn slot(&self, i: usize, j: usize) -> usize {
        let (i, j) = if i >= j { (i, j) } else { (j, i) };
        debug_assert!(i - j <= self.half_bw, "({i}, {j}) outside band");
        i * (self.half_bw + 1) + (i - j)
    }

    /// Entry `A[i][j]`; zero outside the band.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i.abs_diff(j) > self.half_bw {
            return 0.0;
        }
        self.data[self.slot(i, j)]
    }

    /// `A[i][j] += value` (and, implicitly, `A[j][i]`).
    pub fn add(&mut self, i: usize, j: usize, value: f64) {
        let s = self.slot(i, j);
        self.data[s] += value;
    }

    /// Solve `A x = rhs` by banded Cholesky, consuming the matrix.
    pub fn solve(mut self, rhs: &[f64]) -> Result<Vec<f64>, PeakError> {
        let n = self.n;
        let bw = self.half_bw;
        if rhs.len() != n {
            return Err(PeakError::numerical(format!(
                "right-hand side has {} rows, matrix has {n}",
                rhs.len()
            )));
        }

        // Factor in place: A = L Lᵀ
        for i in 0..n {
            let lo = i.saturating_sub(bw);
            for j in lo..=i {
                let mut sum = self.get(i, j);
                for k in lo..j {
                    sum -= self.get(i, k) * self.get(j, k);
                }
                let s = self.slot(i, j);
                if i == j {
                    if !(sum > 0.0) || !sum.is_finite() {
                        return Err(PeakError::numerical(format!(
                            "matrix is not positive definite (pivot {i} = {sum})"
                        )));
                    }
                    self.data[s] = sum.sqrt();
                } else {
                    self.data[s] = sum / self.get(j, j);
                }
            }
        }

        // L y = rhs
        let mut y = vec![0.0; n];
        for i in 0..n {
            let mut sum = rhs[i];
            for k in i.saturating_sub(bw)..i {
                sum -= self.get(i, k) * y[k];
            }
            y[i] = sum / self.get(i, i);
        }

        // Lᵀ x = y
        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            let mut sum = y[i];
            for k in (i + 1)..n.min(i + bw + 1) {
                sum -= self.get(k, i) * x[k];
            }
            x[i] = sum / self.get(i, i);
        }

        Ok(x)
    }
}

// ---------------------------------------------------------------------------
// Least-squares polynomial fit
// ---------------------------------------------------------------------------

/// Fit a degree-`degree` polynomial to `(x, y)` and return it evaluated at `x`.
///
/// The abscissa is centred and scaled before building the Vandermonde
/// matrix; the fitted curve is the same, the conditioning is much better.
/// Under-determined fits return the minimum-norm solution.
pub fn fit_polynomial(x: &[f64], y: &[f64], degree: usize) -> Result<Vec<f64>, PeakError> {
    if x.len() != y.len() {
        return Err(PeakError::LengthMismatch {
            time: x.len(),
            signal: y.len(),
        });
    }
    if x.is_empty() {
        return Err(PeakError::numerical("cannot fit a polynomial to zero points"));
    }

    let n = x.len();
    let mean = x.iter().sum::<f64>() / n as f64;
    let spread = x.iter().map(|v| (v - mean).abs()).fold(0.0, f64::max);
    let scale = if spread > 0.0 { spread } else { 1.0 };
    let u: Vec<f64> = x.iter().map(|v| (v - mean) / scale).collect();

    let a = vandermonde(&u, degree);
    let b = DVector::from_column_slice(y);
    let coeffs = a
        .clone()
        .svd(true, true)
        .solve(&b, SVD_EPS)
        .map_err(PeakError::numerical)?;

    let fitted = a * coeffs;
    if fitted.iter().any(|v| !v.is_finite()) {
        return Err(PeakError::numerical("polynomial fit produced non-finite values"));
    }
    Ok(fitted.iter().copied().collect())
}

fn vandermonde(u: &[f64], degree: usize) -> DMatrix<f64> {
    DMatrix::from_fn(u.len(), degree + 1, |r, c| u[r].powi(c as i32))
}

// ---------------------------------------------------------------------------
// Savitzky-Golay weights
// ---------------------------------------------------------------------------

/// Convolution weights that evaluate the local least-squares polynomial at
/// the centre of an odd window.
pub fn savgol_coefficients(window: usize, poly_order: usize) -> Result<Vec<f64>, PeakError> {
    if window % 2 == 0 {
        return Err(PeakError::numerical("window_length must be odd"));
    }
    if poly_order >= window {
        return Err(PeakError::numerical(
            "polyorder must be less than window_length",
        ));
    }
    let half = (window / 2) as f64;
    let offsets: Vec<f64> = (0..window).map(|j| j as f64 - half).collect();
    let pinv = vandermonde(&offsets, poly_order)
        .pseudo_inverse(SVD_EPS)
        .map_err(PeakError::numerical)?;
    // Row 0 of the pseudo-inverse yields the constant term, i.e. the value at offset 0.
    Ok(pinv.row(0).iter().copied().collect())
}
