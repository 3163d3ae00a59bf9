use std::path::Path;

use serde::Deserialize;

use crate::correction::CorrectionConfig;
use crate::data::loader::ReaderOptions;
use crate::data::model::{CustomTotalRange, PeakDefinition};
use crate::error::ConfigError;
use crate::pipeline::aggregator::TotalMode;

// ---------------------------------------------------------------------------
// Run configuration
// ---------------------------------------------------------------------------

/// Which total the percentages are computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TotalModeKind {
    #[default]
    All,
    Selected,
    Custom,
}

/// Everything needed to analyse a batch, as loaded from a JSON file.
///
/// Missing fields take their defaults, so `{}` is a valid configuration
/// (the four default peaks, no corrections).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub peaks: Vec<PeakDefinition>,
    pub total_mode: TotalModeKind,
    pub custom_total: Option<CustomTotalRange>,
    pub correction: CorrectionConfig,
    pub reader: ReaderOptions,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            peaks: (1..=4)
                .map(|i| {
                    let start = 9.0 + f64::from(i);
                    PeakDefinition::new(format!("Peak{i}"), start, start + 1.0)
                })
                .collect(),
            total_mode: TotalModeKind::All,
            custom_total: None,
            correction: CorrectionConfig::default(),
            reader: ReaderOptions::default(),
        }
    }
}

impl AnalysisConfig {
    /// Read and parse a JSON configuration file. Does not validate.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject configurations the pipeline cannot run meaningfully.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.peaks.is_empty() {
            return Err(ConfigError::NoPeaks);
        }
        for peak in &self.peaks {
            if peak.name.trim().is_empty() {
                return Err(ConfigError::UnnamedPeak);
            }
            if !(peak.start < peak.end) {
                return Err(ConfigError::PeakRange {
                    name: peak.name.clone(),
                    start: peak.start,
                    end: peak.end,
                });
            }
        }

        match self.total_mode {
            TotalModeKind::All => {}
            TotalModeKind::Selected => {
                if !self.peaks.iter().any(|p| p.include_in_total) {
                    return Err(ConfigError::NothingIncluded);
                }
            }
            TotalModeKind::Custom => {
                let range = self
                    .custom_total
                    .as_ref()
                    .ok_or(ConfigError::MissingCustomTotal)?;
                if range.name.trim().is_empty() {
                    return Err(ConfigError::UnnamedCustomTotal);
                }
                if !(range.start < range.end) {
                    return Err(ConfigError::CustomTotalRange {
                        start: range.start,
                        end: range.end,
                    });
                }
            }
        }
        Ok(())
    }

    /// The total mode with its custom range attached.
    ///
    /// `custom` without a range degrades to `Selected`; [`validate`]
    /// rejects that combination up front.
    ///
    /// [`validate`]: AnalysisConfig::validate
    pub fn total_mode(&self) -> TotalMode {
        match (self.total_mode, &self.custom_total) {
            (TotalModeKind::All, _) => TotalMode::All,
            (TotalModeKind::Selected, _) => TotalMode::Selected,
            (TotalModeKind::Custom, Some(range)) => TotalMode::Custom(range.clone()),
            (TotalModeKind::Custom, None) => {
                log::warn!("custom total mode without a custom range, using selected peaks");
                TotalMode::Selected
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::correction::{AlsBaseline, BaselineMethod, NoiseMethod, SavitzkyGolay};
    use crate::data::loader::ColumnSpec;

    #[test]
    fn default_has_four_consecutive_peaks() {
        let cfg = AnalysisConfig::default();
        let names: Vec<&str> = cfg.peaks.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Peak1", "Peak2", "Peak3", "Peak4"]);
        assert_eq!((cfg.peaks[0].start, cfg.peaks[0].end), (10.0, 11.0));
        assert_eq!((cfg.peaks[3].start, cfg.peaks[3].end), (13.0, 14.0));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn empty_object_is_the_default() {
        let cfg: AnalysisConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, AnalysisConfig::default());
    }

    #[test]
    fn parses_full_document() {
        let cfg: AnalysisConfig = serde_json::from_str(
            r#"{
                "peaks": [
                    {"name": "A", "start": 1.0, "end": 2.0},
                    {"name": "B", "start": 2.0, "end": 3.0, "include_in_total": false}
                ],
                "total_mode": "custom",
                "custom_total": {"name": "Window", "start": 0.5, "end": 3.5},
                "correction": {
                    "baseline_method": "Als (Asymmetric Least Squares)",
                    "baseline_params": {"lam": 1000.0, "p": 0.05, "niter": 5},
                    "noise_method": "Savitzky-Golay",
                    "noise_params": {"window_size": 7, "poly_order": 2}
                },
                "reader": {"has_header": false, "time_column": 1, "signal_column": "Signal"}
            }"#,
        )
        .unwrap();

        assert!(cfg.peaks[0].include_in_total);
        assert!(!cfg.peaks[1].include_in_total);
        assert_eq!(
            cfg.total_mode(),
            TotalMode::Custom(CustomTotalRange::new("Window", 0.5, 3.5))
        );
        assert_eq!(
            cfg.correction.noise,
            NoiseMethod::SavitzkyGolay(SavitzkyGolay { window_size: 7, poly_order: 2 })
        );
        assert_eq!(
            cfg.correction.baseline,
            BaselineMethod::Als(AlsBaseline { lambda: 1000.0, p: 0.05, iterations: 5 })
        );
        assert!(!cfg.reader.has_header);
        assert_eq!(cfg.reader.signal_column, ColumnSpec::Name("Signal".into()));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_peaks() {
        let mut cfg = AnalysisConfig::default();
        cfg.peaks[1].end = cfg.peaks[1].start;
        assert!(matches!(cfg.validate(), Err(ConfigError::PeakRange { .. })));

        cfg.peaks[1] = PeakDefinition::new("  ", 1.0, 2.0);
        assert!(matches!(cfg.validate(), Err(ConfigError::UnnamedPeak)));

        cfg.peaks.clear();
        assert!(matches!(cfg.validate(), Err(ConfigError::NoPeaks)));
    }

    #[test]
    fn selected_mode_needs_an_included_peak() {
        let mut cfg = AnalysisConfig {
            total_mode: TotalModeKind::Selected,
            ..AnalysisConfig::default()
        };
        for p in &mut cfg.peaks {
            p.include_in_total = false;
        }
        assert!(matches!(cfg.validate(), Err(ConfigError::NothingIncluded)));

        // `all` ignores the flags entirely.
        cfg.total_mode = TotalModeKind::All;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn custom_mode_checks_its_range() {
        let mut cfg = AnalysisConfig {
            total_mode: TotalModeKind::Custom,
            ..AnalysisConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::MissingCustomTotal)));
        assert_eq!(cfg.total_mode(), TotalMode::Selected);

        cfg.custom_total = Some(CustomTotalRange::new("", 1.0, 2.0));
        assert!(matches!(cfg.validate(), Err(ConfigError::UnnamedCustomTotal)));

        cfg.custom_total = Some(CustomTotalRange::new("Ref", 5.0, 2.0));
        assert!(matches!(cfg.validate(), Err(ConfigError::CustomTotalRange { .. })));
    }

    #[test]
    fn from_path_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.json");
        std::fs::write(&good, r#"{"total_mode": "selected"}"#).unwrap();
        assert_eq!(
            AnalysisConfig::from_path(&good).unwrap().total_mode,
            TotalModeKind::Selected
        );

        let bad = dir.path().join("bad.json");
        let mut f = std::fs::File::create(&bad).unwrap();
        f.write_all(b"{ not json").unwrap();
        assert!(matches!(
            AnalysisConfig::from_path(&bad),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            AnalysisConfig::from_path(&dir.path().join("missing.json")),
            Err(ConfigError::Io { .. })
        ));
    }
}
