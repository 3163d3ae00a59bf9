/// Analysis pipeline: per-window integration, per-file aggregation and
/// multi-file orchestration.
///
/// Architecture:
/// ```text
///   folder / file list
///        │
///        ▼
///   ┌─────────────┐
///   │    batch     │  list files, read each, isolate failures, report progress
///   └─────────────┘
///        │  TimeSeries
///        ▼
///   ┌─────────────┐
///   │  aggregator  │  every peak window + totals + percentages → FileResult
///   └─────────────┘
///        │  (start, end)
///        ▼
///   ┌─────────────┐
///   │  integrator  │  window → noise → baseline → trapezoid → clamp
///   └─────────────┘
/// ```

pub mod aggregator;
pub mod batch;
pub mod integrator;
pub mod record;
