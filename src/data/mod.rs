/// Data layer: core types, loading, validation and windowing.
///
/// Architecture:
/// ```text
///  .csv / .txt / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Table, resolve time/signal columns
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ validate  │  coerce, drop NaN rows → TimeSeries
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  inclusive [start, end] window → TimeSeries
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod validate;
