use crate::correction::CorrectionConfig;
use crate::data::filter::select_window;
use crate::data::model::TimeSeries;
use crate::error::PeakError;

/// Fewest samples a window needs to have an area.
pub const MIN_WINDOW_POINTS: usize = 2;

// ---------------------------------------------------------------------------
// Peak integrator
// ---------------------------------------------------------------------------

/// Computes the corrected area of one retention-time window.
///
/// Steps, in fixed order:
/// 1. keep samples with `start <= time <= end`
/// 2. noise smoothing (if any)
/// 3. baseline removal (if any), on the smoothed window
/// 4. trapezoidal integration
/// 5. clamp negative areas to zero
#[derive(Debug, Clone, Copy, Default)]
pub struct PeakIntegrator {
    config: CorrectionConfig,
}

impl PeakIntegrator {
    pub fn new(config: CorrectionConfig) -> Self {
        PeakIntegrator { config }
    }

    pub fn config(&self) -> &CorrectionConfig {
        &self.config
    }

    /// Corrected signal of the window, paired with its time axis.
    pub fn corrected_window(
        &self,
        series: &TimeSeries,
        start: f64,
        end: f64,
    ) -> Result<TimeSeries, PeakError> {
        if series.time.len() != series.signal.len() {
            return Err(PeakError::LengthMismatch {
                time: series.time.len(),
                signal: series.signal.len(),
            });
        }
        if !(start < end) {
            return Err(PeakError::InvalidRange { start, end });
        }

        let mut window = select_window(series, start, end);
        if window.len() < MIN_WINDOW_POINTS {
            return Err(PeakError::InsufficientData {
                start,
                end,
                found: window.len(),
            });
        }

        if !self.config.noise.is_none() {
            window.signal = self.config.noise.correct(&window.signal)?;
        }
        if !self.config.baseline.is_none() {
            window.signal = self.config.baseline.correct(&window.time, &window.signal)?;
        }
        Ok(window)
    }

    /// Area under the corrected window, never negative.
    pub fn integrate(&self, series: &TimeSeries, start: f64, end: f64) -> Result<f64, PeakError> {
        let window = self.corrected_window(series, start, end)?;
        let area = trapezoid(&window.time, &window.signal);
        log::debug!(
            "window [{start}, {end}]: {} points, raw area {area}",
            window.len()
        );
        // f64::max also maps a NaN area to zero.
        Ok(area.max(0.0))
    }
}

/// Trapezoidal rule over consecutive samples, in the order given.
pub fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum()
}
