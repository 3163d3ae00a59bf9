use super::model::TimeSeries;

// ---------------------------------------------------------------------------
// Window predicate: which samples fall inside a retention-time range
// ---------------------------------------------------------------------------

/// Return indices of samples with `start <= time <= end`.
///
/// Both ends are inclusive and the original sample order is kept, so an
/// unsorted time axis still yields every matching sample.
/// NaN times never match.
pub fn window_indices(series: &TimeSeries, start: f64, end: f64) -> Vec<usize> {
    series
        .time
        .iter()
        .enumerate()
        .filter(|(_, &t)| t >= start && t <= end)
        .map(|(i, _)| i)
        .collect()
}

/// Copy out the samples inside `[start, end]`.
pub fn select_window(series: &TimeSeries, start: f64, end: f64) -> TimeSeries {
    let idx = window_indices(series, start, end);
    TimeSeries {
        time: idx.iter().map(|&i| series.time[i]).collect(),
        signal: idx.iter().map(|&i| series.signal[i]).collect(),
    }
}
