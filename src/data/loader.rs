use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use arrow::array::{Array, Float64Array};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::model::{Table, TimeSeries};
use super::validate::{quality_warnings, validate_columns};
use crate::error::BatchError;

/// File extensions (lower-case, without the dot) the default reader accepts.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "txt", "tsv", "json", "parquet", "pq"];

/// Header keywords that identify the time column (substring, lower-case).
const TIME_KEYWORDS: &[&str] = &["time", "retention", "rt", "min", "minutes", "x"];

/// Header keywords that identify the signal column (substring, lower-case).
const SIGNAL_KEYWORDS: &[&str] = &[
    "signal",
    "intensity",
    "absorbance",
    "au",
    "mau",
    "y",
    "response",
];

/// Candidate delimiters, in tie-break order.
const DELIMITERS: &[u8] = b",;\t| ";

/// Lines sampled for delimiter detection.
const SNIFF_LINES: usize = 5;

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Turns a data file into a validated time/signal pair.
pub trait FileReader {
    fn read(&self, path: &Path) -> Result<TimeSeries>;
}

/// Resolves a folder to the ordered list of files a batch should visit.
pub trait FolderLister {
    fn list(&self, folder: &Path) -> std::result::Result<Vec<PathBuf>, BatchError>;
}

// ---------------------------------------------------------------------------
// Reader options
// ---------------------------------------------------------------------------

/// How to pick a column: by 1-based position or by header name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnSpec {
    Index(usize),
    Name(String),
}

fn default_true() -> bool {
    true
}

fn default_time_column() -> ColumnSpec {
    ColumnSpec::Index(1)
}

fn default_signal_column() -> ColumnSpec {
    ColumnSpec::Index(2)
}

/// Options for [`TabularFileReader`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderOptions {
    #[serde(default = "default_true")]
    pub has_header: bool,
    #[serde(default = "default_time_column")]
    pub time_column: ColumnSpec,
    #[serde(default = "default_signal_column")]
    pub signal_column: ColumnSpec,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            has_header: true,
            time_column: default_time_column(),
            signal_column: default_signal_column(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default implementations
// ---------------------------------------------------------------------------

/// Reads delimited text, JSON and Parquet files from disk.
#[derive(Debug, Clone, Default)]
pub struct TabularFileReader {
    pub options: ReaderOptions,
}

impl TabularFileReader {
    pub fn new(options: ReaderOptions) -> Self {
        TabularFileReader { options }
    }
}

impl FileReader for TabularFileReader {
    fn read(&self, path: &Path) -> Result<TimeSeries> {
        if !path.exists() {
            bail!("File not found: {}", path.display());
        }
        let table = load_table(path, self.options.has_header)
            .with_context(|| format!("Error reading file {}", path.display()))?;
        let (time_col, signal_col) =
            resolve_columns(&table, &self.options.time_column, &self.options.signal_column)?;
        log::debug!(
            "{}: time = '{}', signal = '{}', {} rows",
            path.display(),
            table.column_label(time_col),
            table.column_label(signal_col),
            table.n_rows()
        );

        let series = validate_columns(&table, time_col, signal_col)?;
        for warning in quality_warnings(&series) {
            log::warn!("{}: {warning}", path.display());
        }
        Ok(series)
    }
}

/// Lists the files in a folder whose extension is supported, sorted by path.
#[derive(Debug, Clone)]
pub struct ExtensionLister {
    extensions: Vec<String>,
}

impl Default for ExtensionLister {
    fn default() -> Self {
        ExtensionLister::new(SUPPORTED_EXTENSIONS.iter().copied())
    }
}

impl ExtensionLister {
    pub fn new<'a>(extensions: impl IntoIterator<Item = &'a str>) -> Self {
        ExtensionLister {
            extensions: extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    fn accepts(&self, path: &Path) -> bool {
        let ext = extension_of(path);
        self.extensions.iter().any(|e| *e == ext)
    }
}

impl FolderLister for ExtensionLister {
    fn list(&self, folder: &Path) -> std::result::Result<Vec<PathBuf>, BatchError> {
        if !folder.exists() {
            return Err(BatchError::NotFound(folder.to_path_buf()));
        }
        if !folder.is_dir() {
            return Err(BatchError::NotADirectory(folder.to_path_buf()));
        }
        let io_err = |source| BatchError::Io {
            path: folder.to_path_buf(),
            source,
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(folder).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && self.accepts(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a numeric table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv` / `.txt` / `.tsv` – delimited text, delimiter detected
/// * `.json`    – `[{ "Time": 0.01, "Signal": 1.2 }, ...]`
/// * `.parquet` – one scalar column per variable
pub fn load_table(path: &Path, has_header: bool) -> Result<Table> {
    match extension_of(path).as_str() {
        "csv" | "txt" | "tsv" => load_delimited(path, has_header),
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        other => bail!("Unsupported file format: .{other}"),
    }
}

// ---------------------------------------------------------------------------
// Column resolution
// ---------------------------------------------------------------------------

/// Pick the time and signal columns of a table (0-based indices).
///
/// Index specs first try keyword matching on the headers (if any), then the
/// 1-based position, then the first/second column.  Name specs must match a
/// header exactly, ignoring case.
pub fn resolve_columns(
    table: &Table,
    time: &ColumnSpec,
    signal: &ColumnSpec,
) -> Result<(usize, usize)> {
    let n_cols = table.n_columns();
    if n_cols == 0 {
        bail!("DataFrame has no columns");
    }

    let time_col = match time {
        ColumnSpec::Name(name) => find_header(table, name)?,
        ColumnSpec::Index(idx) => match keyword_column(table, TIME_KEYWORDS) {
            Some(col) => col,
            None => {
                let zero_based = idx.saturating_sub(1);
                if zero_based < n_cols { zero_based } else { 0 }
            }
        },
    };

    let signal_col = match signal {
        ColumnSpec::Name(name) => find_header(table, name)?,
        ColumnSpec::Index(idx) => match keyword_column(table, SIGNAL_KEYWORDS) {
            Some(col) => col,
            None => {
                let zero_based = if *idx > 0 { idx - 1 } else { 1 };
                if zero_based < n_cols {
                    zero_based
                } else if n_cols > 1 {
                    1
                } else {
                    bail!("DataFrame must have at least 2 columns");
                }
            }
        },
    };

    Ok((time_col, signal_col))
}

fn find_header(table: &Table, name: &str) -> Result<usize> {
    table
        .headers
        .as_ref()
        .and_then(|headers| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name.trim()))
        })
        .with_context(|| format!("Column '{name}' not found"))
}

fn keyword_column(table: &Table, keywords: &[&str]) -> Option<usize> {
    table.headers.as_ref()?.iter().position(|h| {
        let lower = h.trim().to_lowercase();
        keywords.iter().any(|k| lower.contains(k))
    })
}

// ---------------------------------------------------------------------------
// Delimited text loader
// ---------------------------------------------------------------------------

/// Guess the field delimiter from a handful of lines.
///
/// A candidate that occurs the same, non-zero number of times on every
/// line wins (earlier candidates first).  Otherwise the most frequent
/// candidate is used; `,` when nothing matches at all.
pub fn detect_delimiter(lines: &[&str]) -> u8 {
    let lines: Vec<&str> = lines.iter().copied().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return b',';
    }

    let counts = |d: u8| -> Vec<usize> {
        lines
            .iter()
            .map(|l| l.trim().bytes().filter(|&b| b == d).count())
            .collect()
    };

    // Space is only trusted as a fallback; it is too common inside headers.
    for &d in DELIMITERS.iter().filter(|&&d| d != b' ') {
        let c = counts(d);
        if c[0] > 0 && c.iter().all(|&n| n == c[0]) {
            return d;
        }
    }

    let (best, total) = DELIMITERS
        .iter()
        .map(|&d| (d, counts(d).iter().sum::<usize>()))
        .fold((b',', 0), |acc, cur| if cur.1 > acc.1 { cur } else { acc });
    if total > 0 { best } else { b',' }
}

fn load_delimited(path: &Path, has_header: bool) -> Result<Table> {
    let text = std::fs::read_to_string(path).context("reading text file")?;
    let text = text.trim_start_matches('\u{feff}');

    let sample: Vec<&str> = text.lines().take(SNIFF_LINES).collect();
    let delimiter = detect_delimiter(&sample);
    log::debug!("{}: delimiter {:?}", path.display(), delimiter as char);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut rows: Vec<Vec<String>> = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("row {row_no}"))?;
        let mut fields: Vec<String> = record.iter().map(str::to_string).collect();
        if delimiter == b' ' {
            // Runs of spaces act as a single separator.
            fields.retain(|f| !f.is_empty());
        }
        if fields.iter().all(|f| f.is_empty()) {
            continue;
        }
        rows.push(fields);
    }

    let headers = if has_header && !rows.is_empty() {
        Some(rows.remove(0))
    } else {
        None
    };

    let n_cols = rows
        .iter()
        .map(Vec::len)
        .chain(headers.iter().map(Vec::len))
        .max()
        .unwrap_or(0);

    let columns = (0..n_cols)
        .map(|c| {
            rows.iter()
                .map(|row| row.get(c).map_or(f64::NAN, |cell| coerce_number(cell)))
                .collect()
        })
        .collect();

    Ok(Table { headers, columns })
}

/// Best-effort numeric coercion; anything unparseable becomes NaN.
fn coerce_number(cell: &str) -> f64 {
    cell.trim().parse::<f64>().unwrap_or(f64::NAN)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "Time": 0.00, "Signal": 0.12 },
///   { "Time": 0.01, "Signal": 0.14 }
/// ]
/// ```
///
/// Column order follows the keys of the first record.
fn load_json(path: &Path) -> Result<Table> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut headers: Vec<String> = Vec::new();
    if let Some(first) = records.first() {
        let obj = first.as_object().context("Row 0 is not a JSON object")?;
        headers.extend(obj.keys().cloned());
    }

    let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(records.len()); headers.len()];
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        if obj.values().all(JsonValue::is_null) {
            continue;
        }
        for (col, key) in columns.iter_mut().zip(headers.iter()) {
            col.push(obj.get(key).map_or(f64::NAN, json_to_number));
        }
    }

    Ok(Table {
        headers: Some(headers),
        columns,
    })
}

fn json_to_number(val: &JsonValue) -> f64 {
    match val {
        JsonValue::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        JsonValue::String(s) => coerce_number(s),
        _ => f64::NAN,
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file whose columns are scalar values, one row per sample.
///
/// Integer, float and string columns are cast to Float64; values that do
/// not survive the cast (or are null) become NaN.  Works with files written
/// by both **Pandas** (`df.to_parquet()`) and **Polars**.
fn load_parquet(path: &Path) -> Result<Table> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let headers: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for (idx, col) in columns.iter_mut().enumerate() {
            let array = batch.column(idx);
            col.extend(column_to_f64(array.as_ref(), &headers[idx])?);
        }
    }

    Ok(Table {
        headers: Some(headers),
        columns,
    })
}

fn column_to_f64(array: &dyn Array, name: &str) -> Result<Vec<f64>> {
    let values = match array.data_type() {
        DataType::List(_) | DataType::LargeList(_) | DataType::Struct(_) => {
            // Nested columns carry no per-sample scalar.
            return Ok(vec![f64::NAN; array.len()]);
        }
        _ => cast(array, &DataType::Float64)
            .with_context(|| format!("casting column '{name}' to Float64"))?,
    };
    let values = values
        .as_any()
        .downcast_ref::<Float64Array>()
        .context("expected Float64Array after cast")?;
    Ok(values.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}
