use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Peak-level failures
// ---------------------------------------------------------------------------

/// Why a single integration window could not produce an area.
///
/// These never abort a file: the aggregator records the message next to
/// the peak and moves on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PeakError {
    #[error("Insufficient data points between {start} and {end} (found {found})")]
    InsufficientData { start: f64, end: f64, found: usize },

    #[error("Invalid range: start ({start}) must be less than end ({end})")]
    InvalidRange { start: f64, end: f64 },

    #[error("time has {time} values but signal has {signal}")]
    LengthMismatch { time: usize, signal: usize },

    #[error("numerical failure: {0}")]
    Numerical(String),
}

impl PeakError {
    pub fn numerical<S: Into<String>>(message: S) -> Self {
        PeakError::Numerical(message.into())
    }
}

// ---------------------------------------------------------------------------
// Run configuration
// ---------------------------------------------------------------------------

/// Rejected analysis configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("At least one peak must be configured")]
    NoPeaks,

    #[error("All peaks must have a name")]
    UnnamedPeak,

    #[error("Invalid range for peak '{name}' ({start} >= {end})")]
    PeakRange { name: String, start: f64, end: f64 },

    #[error("At least one peak must be included in total calculation")]
    NothingIncluded,

    #[error("Custom total mode requires a custom total range")]
    MissingCustomTotal,

    #[error("Custom total peak must have a name")]
    UnnamedCustomTotal,

    #[error("Invalid range for custom total peak ({start} >= {end})")]
    CustomTotalRange { start: f64, end: f64 },

    #[error("reading config {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Batch resolution
// ---------------------------------------------------------------------------

/// Failures that abort a whole batch before any file is processed.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Folder not found: {0:?}")]
    NotFound(PathBuf),

    #[error("Not a valid directory: {0:?}")]
    NotADirectory(PathBuf),

    #[error("No supported files found in {0:?}")]
    NoSupportedFiles(PathBuf),

    #[error("listing {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_message_names_window() {
        let err = PeakError::InsufficientData {
            start: 1.5,
            end: 2.0,
            found: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("1.5"));
        assert!(msg.contains("2"));
        assert!(msg.starts_with("Insufficient data points"));
    }

    #[test]
    fn io_error_keeps_source() {
        use std::error::Error as _;
        let err = BatchError::Io {
            path: PathBuf::from("/nowhere"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.source().is_some());
    }
}
