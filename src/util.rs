//! Utility types and functions for QC tests

use crate::Error;

/// Container of series data sharing a single time axis
#[derive(Debug, Clone, PartialEq)]
pub struct DataCache {
    /// Timestamps of the observations, in chronological order
    ///
    /// Only differences between timestamps are used, so any numeric time axis works, e.g.
    /// seconds since unix epoch
    pub times: Vec<f64>,
    /// Named timeseries, each the same length as `times`
    ///
    /// `None`s represent gaps in the series
    pub data: Vec<(String, Vec<Option<f32>>)>,
}

impl DataCache {
    /// Create a new DataCache, checking that every non-empty series matches the time axis
    pub fn new(times: Vec<f64>, data: Vec<(String, Vec<Option<f32>>)>) -> Result<Self, Error> {
        if let Some((name, _)) = data
            .iter()
            .find(|(_, values)| !values.is_empty() && values.len() != times.len())
        {
            return Err(Error::InvalidInputShape(name.clone()));
        }

        Ok(Self { times, data })
    }
}

pub(crate) fn is_valid(value: f32) -> bool {
    !f32::is_nan(value) && !f32::is_infinite(value)
}

/// Unwrap a datum into a usable value, treating non-finite values as missing
pub(crate) fn valid_value(datum: Option<f32>) -> Option<f32> {
    datum.filter(|value| is_valid(*value))
}

/// Check the time axis is finite and never goes backwards
pub(crate) fn check_times(times: &[f64]) -> Result<(), Error> {
    if times.iter().any(|t| !t.is_finite()) {
        return Err(Error::InvalidArg(
            "times".to_string(),
            "contains non-finite values".to_string(),
        ));
    }
    if times.windows(2).any(|pair| pair[1] < pair[0]) {
        return Err(Error::InvalidArg(
            "times".to_string(),
            "not monotonically non-decreasing".to_string(),
        ));
    }
    Ok(())
}

/// Median gap between consecutive timestamps
///
/// None if there are fewer than 2 timestamps.
pub(crate) fn median_interval(times: &[f64]) -> Option<f64> {
    let mut diffs: Vec<f64> = times.windows(2).map(|pair| pair[1] - pair[0]).collect();
    if diffs.is_empty() {
        return None;
    }
    diffs.sort_by(f64::total_cmp);

    let mid = diffs.len() / 2;
    if diffs.len() % 2 == 0 {
        Some((diffs[mid - 1] + diffs[mid]) / 2.)
    } else {
        Some(diffs[mid])
    }
}

/// Number of preceding observations spanned by `threshold` at the given sampling interval
///
/// Never less than 1, so the first point of a series can't be flagged.
pub(crate) fn window_len(threshold: f64, interval: f64) -> usize {
    // nudge up so thresholds that are exact multiples of the interval survive rounding error
    let len = (threshold / interval + 1e-9).floor();
    if len < 1. {
        1
    } else {
        len as usize
    }
}
