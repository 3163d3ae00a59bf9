//! Signal correction: noise smoothing and baseline removal.
//!
//! Methods are closed enums ([`NoiseMethod`], [`BaselineMethod`]); every
//! non-trivial variant wraps a strategy type implementing [`Correction`].
//! Methods are usually chosen by display name (`"Savitzky-Golay"`,
//! `"Als (Asymmetric Least Squares)"`, ...) plus a numeric parameter map;
//! an unknown name resolves to the `None` variant and leaves the signal
//! untouched. That leniency is intentional and lives in exactly one match
//! arm per enum.

pub mod baseline;
pub mod linalg;
pub mod noise;

use std::collections::BTreeMap;

use serde::Deserialize;

pub use baseline::{AlsBaseline, LinearBaseline, PolynomialBaseline};
pub use noise::{GaussianSmooth, MovingAverage, SavitzkyGolay};

use crate::error::PeakError;

/// Method parameters by name, e.g. `{"window_size": 11, "poly_order": 3}`.
pub type Params = BTreeMap<String, f64>;

// ---------------------------------------------------------------------------
// Strategy interface
// ---------------------------------------------------------------------------

/// One correction step over a window. Output has the input's length.
pub trait Correction {
    fn apply(&self, time: &[f64], signal: &[f64]) -> Result<Vec<f64>, PeakError>;
}

/// First key present in `params`, or `default`.
fn param(params: &Params, keys: &[&str], default: f64) -> f64 {
    keys.iter()
        .find_map(|k| params.get(*k).copied())
        .unwrap_or(default)
}

// ---------------------------------------------------------------------------
// Noise methods
// ---------------------------------------------------------------------------

/// Noise smoothing applied before baseline removal.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum NoiseMethod {
    #[default]
    None,
    MovingAverage(MovingAverage),
    SavitzkyGolay(SavitzkyGolay),
    Gaussian(GaussianSmooth),
}

impl NoiseMethod {
    pub const DEFAULT_WINDOW: f64 = 5.0;
    pub const DEFAULT_SAVGOL_WINDOW: f64 = 11.0;
    pub const DEFAULT_SAVGOL_ORDER: f64 = 3.0;
    pub const DEFAULT_SIGMA: f64 = 2.0;

    /// Resolve a display name and its parameters.
    ///
    /// Unrecognised names yield [`NoiseMethod::None`].
    pub fn from_name(name: &str, params: &Params) -> Self {
        match name.trim() {
            "None" | "" => NoiseMethod::None,
            "Moving Average" | "MovingAverage" => NoiseMethod::MovingAverage(MovingAverage {
                window_size: param(params, &["window_size"], Self::DEFAULT_WINDOW) as i64,
            }),
            "Savitzky-Golay" | "SavitzkyGolay" => NoiseMethod::SavitzkyGolay(SavitzkyGolay {
                window_size: param(params, &["window_size"], Self::DEFAULT_SAVGOL_WINDOW) as i64,
                poly_order: param(params, &["poly_order"], Self::DEFAULT_SAVGOL_ORDER) as i64,
            }),
            "Gaussian" => NoiseMethod::Gaussian(GaussianSmooth {
                sigma: param(params, &["sigma"], Self::DEFAULT_SIGMA),
            }),
            other => {
                log::warn!("unknown noise method '{other}', signal left uncorrected");
                NoiseMethod::None
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NoiseMethod::None => "None",
            NoiseMethod::MovingAverage(_) => "Moving Average",
            NoiseMethod::SavitzkyGolay(_) => "Savitzky-Golay",
            NoiseMethod::Gaussian(_) => "Gaussian",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, NoiseMethod::None)
    }

    fn strategy(&self) -> Option<&dyn Correction> {
        match self {
            NoiseMethod::None => None,
            NoiseMethod::MovingAverage(m) => Some(m),
            NoiseMethod::SavitzkyGolay(m) => Some(m),
            NoiseMethod::Gaussian(m) => Some(m),
        }
    }

    /// Smooth `signal`; `None` returns an unchanged copy.
    pub fn correct(&self, signal: &[f64]) -> Result<Vec<f64>, PeakError> {
        match self.strategy() {
            Some(s) => s.apply(&[], signal),
            None => Ok(signal.to_vec()),
        }
    }
}

// ---------------------------------------------------------------------------
// Baseline methods
// ---------------------------------------------------------------------------

/// Baseline estimate subtracted from each window.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum BaselineMethod {
    #[default]
    None,
    Linear(LinearBaseline),
    Polynomial(PolynomialBaseline),
    Als(AlsBaseline),
}

impl BaselineMethod {
    pub const DEFAULT_DEGREE: f64 = 2.0;
    pub const DEFAULT_LAMBDA: f64 = 1e5;
    pub const DEFAULT_P: f64 = 0.01;
    pub const DEFAULT_ITERATIONS: f64 = 10.0;

    /// Resolve a display name and its parameters.
    ///
    /// Unrecognised names yield [`BaselineMethod::None`].
    pub fn from_name(name: &str, params: &Params) -> Self {
        match name.trim() {
            "None" | "" => BaselineMethod::None,
            "Linear" => BaselineMethod::Linear(LinearBaseline),
            "Polynomial" => BaselineMethod::Polynomial(PolynomialBaseline {
                degree: param(params, &["degree"], Self::DEFAULT_DEGREE).max(0.0) as usize,
            }),
            "Als (Asymmetric Least Squares)" | "ALS" | "Als" => BaselineMethod::Als(AlsBaseline {
                lambda: param(params, &["lam", "lambda"], Self::DEFAULT_LAMBDA),
                p: param(params, &["p"], Self::DEFAULT_P),
                iterations: param(params, &["niter", "iterations"], Self::DEFAULT_ITERATIONS)
                    .max(0.0) as usize,
            }),
            other => {
                log::warn!("unknown baseline method '{other}', signal left uncorrected");
                BaselineMethod::None
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BaselineMethod::None => "None",
            BaselineMethod::Linear(_) => "Linear",
            BaselineMethod::Polynomial(_) => "Polynomial",
            BaselineMethod::Als(_) => "Als (Asymmetric Least Squares)",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, BaselineMethod::None)
    }

    fn strategy(&self) -> Option<&dyn Correction> {
        match self {
            BaselineMethod::None => None,
            BaselineMethod::Linear(m) => Some(m),
            BaselineMethod::Polynomial(m) => Some(m),
            BaselineMethod::Als(m) => Some(m),
        }
    }

    /// Subtract the estimated baseline; `None` returns an unchanged copy.
    pub fn correct(&self, time: &[f64], signal: &[f64]) -> Result<Vec<f64>, PeakError> {
        match self.strategy() {
            Some(s) => s.apply(time, signal),
            None => Ok(signal.to_vec()),
        }
    }
}

// ---------------------------------------------------------------------------
// Correction configuration
// ---------------------------------------------------------------------------

/// The corrections applied to every integration window of a run.
///
/// Deserialises from the name + parameter-map form:
///
/// ```json
/// {
///   "baseline_method": "Linear",
///   "noise_method": "Moving Average",
///   "noise_params": { "window_size": 7 }
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(from = "CorrectionSettings")]
pub struct CorrectionConfig {
    pub noise: NoiseMethod,
    pub baseline: BaselineMethod,
}

impl CorrectionConfig {
    pub fn new(noise: NoiseMethod, baseline: BaselineMethod) -> Self {
        CorrectionConfig { noise, baseline }
    }

    pub fn from_names(
        noise_method: &str,
        noise_params: &Params,
        baseline_method: &str,
        baseline_params: &Params,
    ) -> Self {
        CorrectionConfig {
            noise: NoiseMethod::from_name(noise_method, noise_params),
            baseline: BaselineMethod::from_name(baseline_method, baseline_params),
        }
    }
}

fn none_name() -> String {
    "None".to_string()
}

#[derive(Debug, Deserialize)]
struct CorrectionSettings {
    #[serde(default = "none_name")]
    baseline_method: String,
    #[serde(default)]
    baseline_params: Params,
    #[serde(default = "none_name")]
    noise_method: String,
    #[serde(default)]
    noise_params: Params,
}

impl From<CorrectionSettings> for CorrectionConfig {
    fn from(s: CorrectionSettings) -> Self {
        CorrectionConfig::from_names(
            &s.noise_method,
            &s.noise_params,
            &s.baseline_method,
            &s.baseline_params,
        )
    }
}
