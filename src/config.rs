//! Thresholds of the flat line test.

use crate::{
    checks::series::{flatline_check, flatline_check_cache, FlatlineVariant},
    DataCache, Error, Flag,
};

/// Parameters of a flat line test, validated on construction.
///
/// With the `serde` feature this can be loaded from a QC pipeline's configuration, e.g.
/// `{"tolerance": 0.01, "suspect_threshold": 3600, "fail_threshold": 7200}`. Deserialized
/// configs are not validated until used, or until [`validate`](FlatlineConfig::validate) is
/// called.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlatlineConfig {
    /// Largest variation, exclusive, that still counts as flat
    pub tolerance: f32,
    /// Duration of flatness, in units of the time axis, after which observations are suspect
    pub suspect_threshold: f64,
    /// Duration of flatness, in units of the time axis, after which observations fail
    pub fail_threshold: f64,
}

impl FlatlineConfig {
    /// Create a new config, checking `fail_threshold >= suspect_threshold > 0` and
    /// `tolerance >= 0`
    pub fn new(tolerance: f32, suspect_threshold: f64, fail_threshold: f64) -> Result<Self, Error> {
        let config = Self {
            tolerance,
            suspect_threshold,
            fail_threshold,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the thresholds are consistent
    pub fn validate(&self) -> Result<(), Error> {
        if self.tolerance.is_nan() || self.tolerance < 0. {
            return Err(Error::InvalidArg(
                "tolerance".to_string(),
                format!("{} is not >= 0", self.tolerance),
            ));
        }
        if self.suspect_threshold.is_nan() || self.suspect_threshold <= 0. {
            return Err(Error::InvalidArg(
                "suspect_threshold".to_string(),
                format!("{} is not > 0", self.suspect_threshold),
            ));
        }
        if self.fail_threshold.is_nan() || self.fail_threshold < self.suspect_threshold {
            return Err(Error::InvalidArg(
                "fail_threshold".to_string(),
                format!(
                    "{} is not >= suspect_threshold ({})",
                    self.fail_threshold, self.suspect_threshold
                ),
            ));
        }
        Ok(())
    }

    /// Run [`flatline_check`] with these thresholds
    pub fn check(
        &self,
        variant: FlatlineVariant,
        values: &[Option<f32>],
        times: &[f64],
    ) -> Result<Vec<Flag>, Error> {
        flatline_check(
            variant,
            values,
            times,
            self.tolerance,
            self.suspect_threshold,
            self.fail_threshold,
        )
    }

    /// Run [`flatline_check_cache`] with these thresholds
    pub fn check_cache(
        &self,
        variant: FlatlineVariant,
        cache: &DataCache,
    ) -> Result<Vec<(String, Vec<Flag>)>, Error> {
        flatline_check_cache(
            cache,
            variant,
            self.tolerance,
            self.suspect_threshold,
            self.fail_threshold,
        )
    }
}
