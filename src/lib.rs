//! Peak-area (AUC) analysis for HPLC chromatograms.
//!
//! A run is described by an [`AnalysisConfig`]: a set of named
//! retention-time windows, a total calculation mode and the noise and
//! baseline corrections applied to every window. [`BatchOrchestrator`]
//! applies it to a folder of data files and yields one [`BatchUnit`] per
//! file.

pub mod config;
pub mod correction;
pub mod data;
pub mod error;
pub mod pipeline;

pub use config::AnalysisConfig;
pub use correction::{BaselineMethod, CorrectionConfig, NoiseMethod};
pub use data::model::{CustomTotalRange, PeakDefinition, TimeSeries};
pub use error::{BatchError, ConfigError, PeakError};
pub use pipeline::aggregator::{FileResult, PeakResult, ResultAggregator, TotalMode};
pub use pipeline::batch::{BatchOrchestrator, BatchProgress, BatchSummary, BatchUnit, CancelToken};
pub use pipeline::integrator::PeakIntegrator;
pub use pipeline::record::{FieldValue, FlatRecord};
