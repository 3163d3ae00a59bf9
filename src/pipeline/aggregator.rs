use serde::ser::{Serialize, Serializer};

use super::integrator::PeakIntegrator;
use super::record::FlatRecord;
use crate::correction::CorrectionConfig;
use crate::data::model::{CustomTotalRange, PeakDefinition, TimeSeries};

pub const KEY_FILENAME: &str = "filename";
pub const KEY_TOTAL: &str = "Total";
pub const KEY_TOTAL_STANDARD: &str = "Total_Standard";
const SUFFIX_ERROR: &str = "_error";
const SUFFIX_PERCENT: &str = "_%";
const SUFFIX_PERCENT_STANDARD: &str = "_%_Standard";
const SUFFIX_PERCENT_CUSTOM: &str = "_%_Custom";

// ---------------------------------------------------------------------------
// Total calculation mode
// ---------------------------------------------------------------------------

/// How the reference total for percentages is obtained.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TotalMode {
    /// Sum of every peak; include flags are ignored.
    #[default]
    All,
    /// Sum of the peaks flagged `include_in_total`.
    Selected,
    /// Flag-based sum as in `Selected`, plus an independently integrated
    /// comparison range.
    Custom(CustomTotalRange),
}

impl TotalMode {
    fn counts(&self, peak: &PeakDefinition) -> bool {
        match self {
            TotalMode::All => true,
            TotalMode::Selected | TotalMode::Custom(_) => peak.include_in_total,
        }
    }

    pub fn custom_range(&self) -> Option<&CustomTotalRange> {
        match self {
            TotalMode::Custom(range) => Some(range),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Structured results
// ---------------------------------------------------------------------------

/// Outcome for one peak window in one file.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakResult {
    pub name: String,
    /// Non-negative area; zero when the peak failed.
    pub auc: f64,
    pub error: Option<String>,
    /// Whether the area counted toward the standard total.
    pub in_total: bool,
    pub percent_standard: f64,
    /// Set only in custom-total mode.
    pub percent_custom: Option<f64>,
}

/// The independently integrated comparison window.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomTotalResult {
    pub name: String,
    pub auc: f64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregateTotals {
    pub standard: f64,
    pub custom: Option<CustomTotalResult>,
}

/// Everything computed for one file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileResult {
    pub filename: Option<String>,
    pub peaks: Vec<PeakResult>,
    pub totals: AggregateTotals,
}

impl FileResult {
    pub fn peak(&self, name: &str) -> Option<&PeakResult> {
        self.peaks.iter().find(|p| p.name == name)
    }

    pub fn failed_peaks(&self) -> impl Iterator<Item = &PeakResult> {
        self.peaks.iter().filter(|p| p.error.is_some())
    }

    /// Flatten to the exporter row layout.
    ///
    /// Standard-only modes emit `Total` and `<peak>_%`; custom mode emits
    /// `Total_Standard`, `<peak>_%_Standard`, `<custom>` and `<peak>_%_Custom`.
    pub fn to_record(&self) -> FlatRecord {
        let mut rec = FlatRecord::new();
        if let Some(filename) = &self.filename {
            rec.insert_text(KEY_FILENAME, filename.as_str());
        }

        for p in &self.peaks {
            rec.insert_number(p.name.as_str(), p.auc);
            if let Some(err) = &p.error {
                rec.insert_text(format!("{}{SUFFIX_ERROR}", p.name), err.as_str());
            }
        }

        let (total_key, percent_suffix) = match &self.totals.custom {
            Some(custom) => {
                rec.insert_number(custom.name.as_str(), custom.auc);
                if let Some(err) = &custom.error {
                    rec.insert_text(format!("{}{SUFFIX_ERROR}", custom.name), err.as_str());
                }
                for p in &self.peaks {
                    rec.insert_number(
                        format!("{}{SUFFIX_PERCENT_CUSTOM}", p.name),
                        p.percent_custom.unwrap_or(0.0),
                    );
                }
                (KEY_TOTAL_STANDARD, SUFFIX_PERCENT_STANDARD)
            }
            None => (KEY_TOTAL, SUFFIX_PERCENT),
        };

        rec.insert_number(total_key, self.totals.standard);
        for p in &self.peaks {
            rec.insert_number(format!("{}{percent_suffix}", p.name), p.percent_standard);
        }
        rec
    }
}

impl Serialize for FileResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_record().serialize(serializer)
    }
}

/// `part / total * 100`, or zero for a non-positive total.
pub fn percent_of(part: f64, total: f64) -> f64 {
    if total > 0.0 { part / total * 100.0 } else { 0.0 }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Integrates a set of peak windows over one series and derives totals
/// and percentages.
///
/// A failing peak is recorded with area 0 and its error message; the
/// remaining peaks are still processed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator {
    integrator: PeakIntegrator,
}

impl ResultAggregator {
    pub fn new(config: CorrectionConfig) -> Self {
        ResultAggregator {
            integrator: PeakIntegrator::new(config),
        }
    }

    pub fn integrator(&self) -> &PeakIntegrator {
        &self.integrator
    }

    pub fn aggregate(
        &self,
        series: &TimeSeries,
        peaks: &[PeakDefinition],
        mode: &TotalMode,
    ) -> FileResult {
        let mut results: Vec<PeakResult> = peaks
            .iter()
            .map(|peak| {
                let (auc, error) = match self.integrator.integrate(series, peak.start, peak.end) {
                    Ok(auc) => (auc, None),
                    Err(e) => {
                        log::debug!("peak '{}' failed: {e}", peak.name);
                        (0.0, Some(e.to_string()))
                    }
                };
                PeakResult {
                    name: peak.name.clone(),
                    auc,
                    error,
                    in_total: mode.counts(peak),
                    percent_standard: 0.0,
                    percent_custom: None,
                }
            })
            .collect();

        let standard: f64 = results.iter().filter(|r| r.in_total).map(|r| r.auc).sum();
        for r in &mut results {
            if r.in_total {
                r.percent_standard = percent_of(r.auc, standard);
            }
        }

        let custom = mode.custom_range().map(|range| {
            let (auc, error) = match self.integrator.integrate(series, range.start, range.end) {
                Ok(auc) => (auc, None),
                Err(e) => {
                    log::debug!("custom total '{}' failed: {e}", range.name);
                    (0.0, Some(e.to_string()))
                }
            };
            for r in &mut results {
                r.percent_custom = Some(percent_of(r.auc, auc));
            }
            CustomTotalResult {
                name: range.name.clone(),
                auc,
                error,
            }
        });

        FileResult {
            filename: None,
            peaks: results,
            totals: AggregateTotals { standard, custom },
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::correction::Params;

    /// Two unit-height plateaus of different widths on a flat zero signal.
    fn two_peaks() -> TimeSeries {
        let time: Vec<f64> = (0..=100).map(|i| i as f64 * 0.1).collect();
        let signal = time
            .iter()
            .map(|&t| {
                if (2.0..=3.0).contains(&t) || (5.0..=8.0).contains(&t) {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        TimeSeries::new(time, signal).unwrap()
    }

    fn peaks() -> Vec<PeakDefinition> {
        vec![
            PeakDefinition::new("A", 2.0, 3.0),
            PeakDefinition::new("B", 5.0, 8.0).included(false),
        ]
    }

    #[test]
    fn all_mode_ignores_include_flags() {
        let res = ResultAggregator::default().aggregate(&two_peaks(), &peaks(), &TotalMode::All);
        let rec = res.to_record();
        let a = rec.number("A").unwrap();
        let b = rec.number("B").unwrap();
        assert_abs_diff_eq!(rec.number("Total").unwrap(), a + b, epsilon = 1e-9);
        assert_abs_diff_eq!(
            rec.number("A_%").unwrap() + rec.number("B_%").unwrap(),
            100.0,
            epsilon = 1e-9
        );
        assert!(!rec.contains_key("Total_Standard"));
    }

    #[test]
    fn selected_mode_zeroes_excluded_percentages() {
        let res =
            ResultAggregator::default().aggregate(&two_peaks(), &peaks(), &TotalMode::Selected);
        let rec = res.to_record();
        assert_abs_diff_eq!(
            rec.number("Total").unwrap(),
            rec.number("A").unwrap(),
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(rec.number("A_%").unwrap(), 100.0, epsilon = 1e-9);
        assert_eq!(rec.number("B_%"), Some(0.0));
        assert!(rec.number("B").unwrap() > 0.0);
    }

    #[test]
    fn custom_mode_emits_both_key_sets() {
        let mode = TotalMode::Custom(CustomTotalRange::new("Window", 0.0, 10.0));
        let res = ResultAggregator::default().aggregate(&two_peaks(), &peaks(), &mode);
        let rec = res.to_record();

        let keys: Vec<&str> = rec.keys().collect();
        assert_eq!(
            keys,
            vec![
                "A",
                "B",
                "Window",
                "A_%_Custom",
                "B_%_Custom",
                "Total_Standard",
                "A_%_Standard",
                "B_%_Standard"
            ]
        );
        let window = rec.number("Window").unwrap();
        assert_abs_diff_eq!(
            rec.number("B_%_Custom").unwrap(),
            rec.number("B").unwrap() / window * 100.0,
            epsilon = 1e-9
        );
        // Standard total still follows the include flags.
        assert_abs_diff_eq!(
            rec.number("Total_Standard").unwrap(),
            rec.number("A").unwrap(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn failing_custom_range_reports_error_and_zero_percentages() {
        let mode = TotalMode::Custom(CustomTotalRange::new("Ref", 50.0, 60.0));
        let rec = ResultAggregator::default()
            .aggregate(&two_peaks(), &peaks(), &mode)
            .to_record();
        assert_eq!(rec.number("Ref"), Some(0.0));
        assert!(rec.text("Ref_error").unwrap().starts_with("Insufficient data"));
        assert_eq!(rec.number("A_%_Custom"), Some(0.0));
    }

    #[test]
    fn failing_peak_is_isolated() {
        let mut defs = peaks();
        defs.insert(1, PeakDefinition::new("Ghost", 40.0, 41.0));
        let res = ResultAggregator::default().aggregate(&two_peaks(), &defs, &TotalMode::All);
        let rec = res.to_record();
        assert_eq!(rec.number("Ghost"), Some(0.0));
        assert!(rec.text("Ghost_error").is_some());
        assert!(rec.number("A").unwrap() > 0.0);
        assert!(rec.number("B").unwrap() > 0.0);
        assert_eq!(res.failed_peaks().count(), 1);
        assert_eq!(rec.number("Ghost_%"), Some(0.0));
    }

    #[test]
    fn reversed_peak_reports_invalid_range() {
        let mut defs = peaks();
        defs.push(PeakDefinition::new("Rev", 3.0, 2.0));
        let reference =
            ResultAggregator::default().aggregate(&two_peaks(), &peaks(), &TotalMode::All);
        let res = ResultAggregator::default().aggregate(&two_peaks(), &defs, &TotalMode::All);
        let rec = res.to_record();

        assert_eq!(rec.number("Rev"), Some(0.0));
        assert!(rec.text("Rev_error").unwrap().starts_with("Invalid range"));
        assert_eq!(rec.number("Rev_%"), Some(0.0));
        assert_eq!(rec.number("A"), reference.to_record().number("A"));
        assert_eq!(rec.number("B"), reference.to_record().number("B"));
        assert_eq!(res.totals.standard, reference.totals.standard);
    }

    #[test]
    fn oversized_corrections_fail_per_peak() {
        let noise = Params::from([("sigma".to_string(), 1e18)]);
        let cfg = CorrectionConfig::from_names("Gaussian", &noise, "None", &Params::new());
        let rec = ResultAggregator::new(cfg)
            .aggregate(&two_peaks(), &[PeakDefinition::new("P", 2.0, 3.0)], &TotalMode::All)
            .to_record();
        assert_eq!(rec.number("P"), Some(0.0));
        assert!(rec.text("P_error").unwrap().contains("sigma"));

        let baseline = Params::from([("degree".to_string(), 1e9)]);
        let cfg = CorrectionConfig::from_names("None", &Params::new(), "Polynomial", &baseline);
        let rec = ResultAggregator::new(cfg)
            .aggregate(&two_peaks(), &[PeakDefinition::new("P", 2.0, 3.0)], &TotalMode::All)
            .to_record();
        assert_eq!(rec.number("P"), Some(0.0));
        assert!(rec.text("P_error").unwrap().contains("degree"));
    }

    #[test]
    fn repeated_end_times_under_linear_baseline_give_zero_without_error() {
        let ts = TimeSeries::new(vec![0.0, 1.0, 1.0, 2.0], vec![1.0, 4.0, 6.0, 1.0]).unwrap();
        let cfg = CorrectionConfig::from_names("None", &Params::new(), "Linear", &Params::new());
        let rec = ResultAggregator::new(cfg)
            .aggregate(&ts, &[PeakDefinition::new("P", 0.5, 1.5)], &TotalMode::All)
            .to_record();
        assert_eq!(rec.number("P"), Some(0.0));
        assert!(!rec.contains_key("P_error"));
    }

    #[test]
    fn zero_total_gives_zero_percentages() {
        let ts = TimeSeries::new(vec![0.0, 1.0, 2.0], vec![0.0, 0.0, 0.0]).unwrap();
        let peaks = [PeakDefinition::new("P", 0.0, 2.0)];
        let res = ResultAggregator::default().aggregate(&ts, &peaks, &TotalMode::All);
        assert_eq!(res.totals.standard, 0.0);
        assert_eq!(res.peak("P").unwrap().percent_standard, 0.0);
    }

    #[test]
    fn filename_leads_the_record() {
        let mut res =
            ResultAggregator::default().aggregate(&two_peaks(), &peaks(), &TotalMode::All);
        res.filename = Some("run.csv".into());
        let rec = res.to_record();
        assert_eq!(rec.keys().next(), Some("filename"));
        assert_eq!(rec.text("filename"), Some("run.csv"));
    }
}
