use serde::{Deserialize, Serialize};

use crate::error::PeakError;

// ---------------------------------------------------------------------------
// TimeSeries – one chromatogram
// ---------------------------------------------------------------------------

/// A chromatogram: detector response sampled along a time axis.
///
/// `time` is usually non-decreasing but nothing here relies on it; window
/// selection works on value masks, not positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    /// Retention time axis (x).
    pub time: Vec<f64>,
    /// Detector response (y) – same length as `time`.
    pub signal: Vec<f64>,
}

impl TimeSeries {
    /// Pair up the two axes, refusing mismatched lengths.
    pub fn new(time: Vec<f64>, signal: Vec<f64>) -> Result<Self, PeakError> {
        if time.len() != signal.len() {
            return Err(PeakError::LengthMismatch {
                time: time.len(),
                signal: signal.len(),
            });
        }
        Ok(TimeSeries { time, signal })
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Whether the series holds no samples.
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Smallest and largest time value, ignoring order.
    pub fn time_range(&self) -> Option<(f64, f64)> {
        if self.is_empty() {
            return None;
        }
        let min = self.time.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.time.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some((min, max))
    }
}

// ---------------------------------------------------------------------------
// Integration windows
// ---------------------------------------------------------------------------

fn default_include() -> bool {
    true
}

/// A named retention-time window whose area is reported per file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakDefinition {
    pub name: String,
    pub start: f64,
    pub end: f64,
    /// Counts toward the standard total in `selected` and `custom` modes.
    #[serde(default = "default_include")]
    pub include_in_total: bool,
}

impl PeakDefinition {
    pub fn new(name: impl Into<String>, start: f64, end: f64) -> Self {
        PeakDefinition {
            name: name.into(),
            start,
            end,
            include_in_total: true,
        }
    }

    /// Builder-style toggle for `include_in_total`.
    pub fn included(mut self, include: bool) -> Self {
        self.include_in_total = include;
        self
    }
}

/// Independent comparison window used to normalise peak areas.
///
/// It is never part of the peak list and ignores include flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomTotalRange {
    pub name: String,
    pub start: f64,
    pub end: f64,
}

impl CustomTotalRange {
    pub fn new(name: impl Into<String>, start: f64, end: f64) -> Self {
        CustomTotalRange {
            name: name.into(),
            start,
            end,
        }
    }
}

// ---------------------------------------------------------------------------
// Table – a parsed data file before column resolution
// ---------------------------------------------------------------------------

/// Column-major numeric table as read from disk.
///
/// Cells that could not be coerced to a number are stored as NaN so the
/// validator can decide what to keep.
#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Column names, or `None` when the file was read without a header row.
    pub headers: Option<Vec<String>>,
    /// One vector per column, all of equal length.
    pub columns: Vec<Vec<f64>>,
}

impl Table {
    /// Number of data rows.
    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    /// Number of columns.
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Display label of a column: its header, or its 1-based position.
    pub fn column_label(&self, idx: usize) -> String {
        self.headers
            .as_ref()
            .and_then(|h| h.get(idx).cloned())
            .unwrap_or_else(|| format!("column {}", idx + 1))
    }
}
