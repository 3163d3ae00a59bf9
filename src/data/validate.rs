use anyhow::{Result, bail};

use super::model::{Table, TimeSeries};

// ---------------------------------------------------------------------------
// Validator: table + resolved columns → clean TimeSeries
// ---------------------------------------------------------------------------

/// Check the resolved time/signal columns and extract a clean series.
///
/// Fails when:
/// * the table has no rows
/// * either column index is out of range
/// * either column holds no numeric value at all
/// * no row has both a numeric time and a numeric signal
///
/// Rows where either value is NaN are dropped.
pub fn validate_columns(table: &Table, time_col: usize, signal_col: usize) -> Result<TimeSeries> {
    if table.n_rows() == 0 {
        bail!("DataFrame is empty");
    }
    let Some(time) = table.columns.get(time_col) else {
        bail!("Time column '{}' not found", table.column_label(time_col));
    };
    let Some(signal) = table.columns.get(signal_col) else {
        bail!("Signal column '{}' not found", table.column_label(signal_col));
    };

    if time.iter().all(|v| v.is_nan()) {
        bail!(
            "Time column '{}' must contain numeric data",
            table.column_label(time_col)
        );
    }
    if signal.iter().all(|v| v.is_nan()) {
        bail!(
            "Signal column '{}' must contain numeric data",
            table.column_label(signal_col)
        );
    }

    let (t, s): (Vec<f64>, Vec<f64>) = time
        .iter()
        .zip(signal.iter())
        .filter(|(t, s)| !t.is_nan() && !s.is_nan())
        .map(|(&t, &s)| (t, s))
        .unzip();

    if t.is_empty() {
        bail!("No valid data points after removing NaN values");
    }

    let dropped = table.n_rows() - t.len();
    if dropped > 0 {
        log::debug!("dropped {dropped} row(s) with missing time/signal values");
    }

    Ok(TimeSeries { time: t, signal: s })
}

// ---------------------------------------------------------------------------
// Data-quality hints (never fatal)
// ---------------------------------------------------------------------------

/// Average sample spacing above which a series is flagged as sparse.
pub const LOW_DENSITY_SPACING: f64 = 0.1;

/// Human-readable warnings about a series that is usable but suspicious.
pub fn quality_warnings(series: &TimeSeries) -> Vec<String> {
    let mut warnings = Vec::new();

    let mut sorted = series.time.clone();
    sorted.sort_by(f64::total_cmp);
    if sorted.windows(2).any(|w| w[0] == w[1]) {
        warnings.push("Duplicate time values detected".to_string());
    }

    if series.signal.iter().any(|&v| v < 0.0) {
        warnings.push("Negative signal values detected".to_string());
    }

    if let Some((min, max)) = series.time_range() {
        let n = series.len();
        let avg_spacing = if n > 1 { (max - min) / n as f64 } else { 0.0 };
        if avg_spacing > LOW_DENSITY_SPACING {
            warnings.push(format!("Low data density: avg spacing = {avg_spacing:.3}"));
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(time: Vec<f64>, signal: Vec<f64>) -> Table {
        Table {
            headers: Some(vec!["Time".into(), "Signal".into()]),
            columns: vec![time, signal],
        }
    }

    #[test]
    fn drops_rows_with_missing_values() {
        let t = table(vec![0.0, 1.0, f64::NAN, 3.0], vec![1.0, f64::NAN, 2.0, 3.0]);
        let ts = validate_columns(&t, 0, 1).unwrap();
        assert_eq!(ts.time, vec![0.0, 3.0]);
        assert_eq!(ts.signal, vec![1.0, 3.0]);
    }

    #[test]
    fn empty_table_fails() {
        let t = table(vec![], vec![]);
        let err = validate_columns(&t, 0, 1).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn non_numeric_column_fails() {
        let t = table(vec![0.0, 1.0], vec![f64::NAN, f64::NAN]);
        let err = validate_columns(&t, 0, 1).unwrap_err();
        assert!(err.to_string().contains("Signal column 'Signal'"));
    }

    #[test]
    fn no_complete_row_fails() {
        let t = table(vec![0.0, f64::NAN], vec![f64::NAN, 1.0]);
        let err = validate_columns(&t, 0, 1).unwrap_err();
        assert!(err.to_string().contains("No valid data points"));
    }

    #[test]
    fn out_of_range_column_fails() {
        let t = table(vec![0.0], vec![1.0]);
        assert!(validate_columns(&t, 0, 5).is_err());
    }

    #[test]
    fn flags_duplicates_negatives_and_sparse_data() {
        let ts = TimeSeries::new(vec![0.0, 1.0, 1.0, 3.0], vec![1.0, -0.5, 2.0, 0.0]).unwrap();
        let w = quality_warnings(&ts);
        assert_eq!(w.len(), 3);
        assert!(w[2].starts_with("Low data density"));
    }

    #[test]
    fn dense_clean_series_has_no_warnings() {
        let time: Vec<f64> = (0..100).map(|i| i as f64 * 0.01).collect();
        let ts = TimeSeries::new(time, vec![1.0; 100]).unwrap();
        assert!(quality_warnings(&ts).is_empty());
    }
}
