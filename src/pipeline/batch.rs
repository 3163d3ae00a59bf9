use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use serde::ser::{Serialize, Serializer};

use super::aggregator::{FileResult, KEY_FILENAME, ResultAggregator, TotalMode};
use super::record::FlatRecord;
use crate::config::AnalysisConfig;
use crate::correction::CorrectionConfig;
use crate::data::loader::{ExtensionLister, FileReader, FolderLister, TabularFileReader};
use crate::data::model::PeakDefinition;
use crate::error::BatchError;

// ---------------------------------------------------------------------------
// Progress & cancellation
// ---------------------------------------------------------------------------

/// Reported once per file, after the file has been processed.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchProgress {
    /// 1-based position of the file just processed.
    pub current: usize,
    pub total: usize,
    pub filename: String,
    pub success: bool,
}

/// Shared flag that stops a running batch before its next file.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

const KEY_ERROR: &str = "error";

// ---------------------------------------------------------------------------
// Per-file outcome
// ---------------------------------------------------------------------------

/// One processed file: either its results or the rendered error chain.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchUnit {
    pub filename: String,
    pub path: PathBuf,
    pub outcome: std::result::Result<FileResult, String>,
}

impl BatchUnit {
    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn result(&self) -> Option<&FileResult> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&str> {
        self.outcome.as_ref().err().map(String::as_str)
    }

    /// Flat row: the file's results, or just `filename` and `error`.
    pub fn to_record(&self) -> FlatRecord {
        match &self.outcome {
            Ok(result) => result.to_record(),
            Err(error) => {
                let mut rec = FlatRecord::new();
                rec.insert_text(KEY_FILENAME, self.filename.as_str());
                rec.insert_text(KEY_ERROR, error.as_str());
                rec
            }
        }
    }
}

impl Serialize for BatchUnit {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_record().serialize(serializer)
    }
}

/// Success / failure counts over a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn of(units: &[BatchUnit]) -> Self {
        let succeeded = units.iter().filter(|u| u.success()).count();
        BatchSummary {
            succeeded,
            failed: units.len() - succeeded,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs the peak analysis over a folder or an explicit list of files.
///
/// Files are processed sequentially in listing order. A file that fails
/// to load or validate becomes a failed [`BatchUnit`]; the batch goes on.
/// Only resolving the folder itself can abort the whole run.
pub struct BatchOrchestrator<R = TabularFileReader, L = ExtensionLister> {
    reader: R,
    lister: L,
    peaks: Vec<PeakDefinition>,
    mode: TotalMode,
    aggregator: ResultAggregator,
    cancel: Option<CancelToken>,
}

impl BatchOrchestrator {
    /// Default on-disk reader and lister, configured from `config`.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        BatchOrchestrator::new(
            TabularFileReader::new(config.reader.clone()),
            ExtensionLister::default(),
            config.peaks.clone(),
            config.total_mode(),
            config.correction,
        )
    }
}

impl<R: FileReader, L: FolderLister> BatchOrchestrator<R, L> {
    pub fn new(
        reader: R,
        lister: L,
        peaks: Vec<PeakDefinition>,
        mode: TotalMode,
        correction: CorrectionConfig,
    ) -> Self {
        log::debug!(
            "correction: noise = {}, baseline = {}",
            correction.noise.name(),
            correction.baseline.name()
        );
        BatchOrchestrator {
            reader,
            lister,
            peaks,
            mode,
            aggregator: ResultAggregator::new(correction),
            cancel: None,
        }
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn peaks(&self) -> &[PeakDefinition] {
        &self.peaks
    }

    pub fn total_mode(&self) -> &TotalMode {
        &self.mode
    }

    /// Load one file and aggregate its peaks.
    pub fn process_file(&self, path: &Path) -> Result<FileResult> {
        let series = self.reader.read(path)?;
        let mut result = self.aggregator.aggregate(&series, &self.peaks, &self.mode);
        result.filename = Some(file_name(path));
        Ok(result)
    }

    /// Process every supported file in a folder.
    ///
    /// A path naming a file resolves to the folder containing it.
    pub fn process_batch(
        &self,
        path: &Path,
        on_progress: impl FnMut(&BatchProgress),
    ) -> std::result::Result<Vec<BatchUnit>, BatchError> {
        let folder = resolve_folder(path)?;
        let files = self.lister.list(&folder)?;
        if files.is_empty() {
            return Err(BatchError::NoSupportedFiles(folder));
        }
        log::info!("found {} files in {}", files.len(), folder.display());
        Ok(self.run(&files, on_progress))
    }

    /// Process an explicit list of files in the order given.
    pub fn process_files<P: AsRef<Path>>(
        &self,
        paths: &[P],
        on_progress: impl FnMut(&BatchProgress),
    ) -> Vec<BatchUnit> {
        let files: Vec<PathBuf> = paths.iter().map(|p| p.as_ref().to_path_buf()).collect();
        self.run(&files, on_progress)
    }

    fn run(
        &self,
        files: &[PathBuf],
        mut on_progress: impl FnMut(&BatchProgress),
    ) -> Vec<BatchUnit> {
        let total = files.len();
        let mut units = Vec::with_capacity(total);

        for (idx, path) in files.iter().enumerate() {
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                log::info!("batch cancelled after {idx} of {total} files");
                break;
            }

            let filename = file_name(path);
            let outcome = self.process_file(path).map_err(|e| format!("{e:#}"));
            match &outcome {
                Ok(_) => log::info!("[{}/{total}] {filename}", idx + 1),
                Err(e) => log::warn!("[{}/{total}] {filename} failed: {e}", idx + 1),
            }

            let progress = BatchProgress {
                current: idx + 1,
                total,
                filename: filename.clone(),
                success: outcome.is_ok(),
            };
            units.push(BatchUnit {
                filename,
                path: path.clone(),
                outcome,
            });
            on_progress(&progress);
        }

        let summary = BatchSummary::of(&units);
        log::info!(
            "batch finished: {} succeeded, {} failed",
            summary.succeeded,
            summary.failed
        );
        units
    }
}

fn resolve_folder(path: &Path) -> std::result::Result<PathBuf, BatchError> {
    if !path.exists() {
        return Err(BatchError::NotFound(path.to_path_buf()));
    }
    if path.is_file() {
        return Ok(match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        });
    }
    Ok(path.to_path_buf())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::HashMap;

    use anyhow::anyhow;

    use super::*;
    use crate::data::model::TimeSeries;

    /// In-memory reader: known names yield a triangle, anything else fails.
    struct MemReader(HashMap<String, TimeSeries>);

    impl FileReader for MemReader {
        fn read(&self, path: &Path) -> Result<TimeSeries> {
            self.0
                .get(&file_name(path))
                .cloned()
                .ok_or_else(|| anyhow!("cannot parse {}", path.display()))
        }
    }

    struct FixedLister(Vec<PathBuf>);

    impl FolderLister for FixedLister {
        fn list(&self, _folder: &Path) -> std::result::Result<Vec<PathBuf>, BatchError> {
            Ok(self.0.clone())
        }
    }

    fn triangle() -> TimeSeries {
        TimeSeries::new(vec![0.0, 1.0, 2.0, 3.0, 4.0], vec![0.0, 2.0, 4.0, 2.0, 0.0]).unwrap()
    }

    fn orchestrator(files: &[&str]) -> BatchOrchestrator<MemReader, FixedLister> {
        let good = ["a.csv", "c.csv"]
            .iter()
            .map(|n| (n.to_string(), triangle()))
            .collect();
        BatchOrchestrator::new(
            MemReader(good),
            FixedLister(files.iter().map(PathBuf::from).collect()),
            vec![PeakDefinition::new("P", 0.0, 4.0)],
            TotalMode::All,
            CorrectionConfig::default(),
        )
    }

    #[test]
    fn failures_are_isolated_per_file() {
        let orch = orchestrator(&["a.csv", "b.csv", "c.csv"]);
        let units = orch.process_files(&["a.csv", "b.csv", "c.csv"], |_| {});
        assert_eq!(units.len(), 3);
        assert!(units[0].success());
        assert!(!units[1].success());
        assert!(units[2].success());
        assert!(units[1].error().unwrap().contains("cannot parse"));
        assert_eq!(units[0].result().unwrap().filename.as_deref(), Some("a.csv"));
        assert_eq!(BatchSummary::of(&units), BatchSummary { succeeded: 2, failed: 1 });
    }

    #[test]
    fn progress_reports_running_index() {
        let orch = orchestrator(&["a.csv", "b.csv"]);
        let mut seen = Vec::new();
        orch.process_files(&["a.csv", "b.csv"], |p| seen.push(p.clone()));
        assert_eq!(
            seen,
            vec![
                BatchProgress { current: 1, total: 2, filename: "a.csv".into(), success: true },
                BatchProgress { current: 2, total: 2, filename: "b.csv".into(), success: false },
            ]
        );
    }

    #[test]
    fn cancellation_stops_before_next_file() {
        let token = CancelToken::new();
        let orch = orchestrator(&[]).with_cancel_token(token.clone());
        let calls = Cell::new(0);
        let units = orch.process_files(&["a.csv", "b.csv", "c.csv"], |_| {
            calls.set(calls.get() + 1);
            token.cancel();
        });
        assert_eq!(units.len(), 1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn empty_listing_is_an_error() {
        let orch = orchestrator(&[]);
        let dir = std::env::temp_dir();
        let err = orch.process_batch(&dir, |_| {}).unwrap_err();
        assert!(matches!(err, BatchError::NoSupportedFiles(_)));
    }

    #[test]
    fn failed_unit_serializes_without_peak_keys() {
        let orch = orchestrator(&[]);
        let units = orch.process_files(&["zzz.csv"], |_| {});
        let json = serde_json::to_value(&units[0]).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["filename"], "zzz.csv");
        assert!(obj["error"].as_str().unwrap().contains("cannot parse"));
    }
}
