use crate::{
    util::{self, DataCache},
    Error, Flag, FlatlineConfig,
};
use tracing::{debug, trace};

/// Which definition of "unchanged" [`flatline_check`] applies to the trailing window of each
/// observation.
///
/// The two variants agree on steadily flat or steadily varying data, but not around spikes. On
/// the falling side of a spike the observations sit between the peak and the earlier plateau,
/// so each of them can be within tolerance of everything before it (Difference flags them)
/// while the window as a whole spans more than the tolerance (PeakToPeak does not).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FlatlineVariant {
    /// Every observation in the window differs from the observation being QCed by less than
    /// the tolerance
    Difference,
    /// The range (max - min) of the window, including the observation being QCed, is less
    /// than the tolerance
    PeakToPeak,
}

/// Decides whether a trailing window stays flat as it is grown backwards, one predecessor at
/// a time, from the observation being QCed.
trait FlatnessPredicate {
    /// Try to add `value` to the window, returns false if that would break flatness
    fn admit(&mut self, value: f32) -> bool;
}

struct Difference {
    current: f32,
    tolerance: f32,
}

impl FlatnessPredicate for Difference {
    fn admit(&mut self, value: f32) -> bool {
        (value - self.current).abs() < self.tolerance
    }
}

struct PeakToPeak {
    min: f32,
    max: f32,
    tolerance: f32,
}

impl FlatnessPredicate for PeakToPeak {
    fn admit(&mut self, value: f32) -> bool {
        let min = self.min.min(value);
        let max = self.max.max(value);
        if max - min < self.tolerance {
            self.min = min;
            self.max = max;
            true
        } else {
            false
        }
    }
}

/// Lengths, in preceding observations, of the windows needed to escalate a flag
#[derive(Copy, Clone, Debug, PartialEq)]
struct Windows {
    suspect_len: usize,
    fail_len: usize,
}

impl Windows {
    /// Size the windows from the sampling interval of `times`
    ///
    /// None if the interval can't be determined, in which case nothing can be flagged.
    fn from_times(times: &[f64], suspect_threshold: f64, fail_threshold: f64) -> Option<Self> {
        let interval = match util::median_interval(times) {
            Some(interval) if interval > 0. => interval,
            _ => {
                debug!("sampling interval undetermined, no flat line windows");
                return None;
            }
        };

        let windows = Windows {
            suspect_len: util::window_len(suspect_threshold, interval),
            fail_len: util::window_len(fail_threshold, interval),
        };
        debug!(
            interval,
            suspect_len = windows.suspect_len,
            fail_len = windows.fail_len,
            "sized flat line windows"
        );
        Some(windows)
    }

    /// Map the number of flat predecessors of an observation to a flag
    ///
    /// Both lengths are inclusive lower bounds.
    fn severity(&self, run: usize) -> Flag {
        if run >= self.fail_len {
            Flag::Fail
        } else if run >= self.suspect_len {
            Flag::Suspect
        } else {
            Flag::Pass
        }
    }
}

/// Count how many of `preceding` (nearest first) join a flat window, stopping at the first
/// missing value or the first value the predicate rejects
fn flat_run<'a, P: FlatnessPredicate>(
    preceding: impl Iterator<Item = &'a Option<f32>>,
    mut predicate: P,
) -> usize {
    preceding
        .map_while(|datum| util::valid_value(*datum))
        .take_while(|value| predicate.admit(*value))
        .count()
}

fn flag_series(
    values: &[Option<f32>],
    windows: Option<Windows>,
    variant: FlatlineVariant,
    tolerance: f32,
) -> Vec<Flag> {
    values
        .iter()
        .enumerate()
        .map(|(i, datum)| {
            let current = match util::valid_value(*datum) {
                Some(current) => current,
                None => return Flag::Missing,
            };
            let windows = match windows {
                Some(windows) => windows,
                None => return Flag::Pass,
            };

            // no need to look further back than the fail window
            let preceding = values[..i].iter().rev().take(windows.fail_len);
            let run = match variant {
                FlatlineVariant::Difference => flat_run(
                    preceding,
                    Difference {
                        current,
                        tolerance,
                    },
                ),
                FlatlineVariant::PeakToPeak => flat_run(
                    preceding,
                    PeakToPeak {
                        min: current,
                        max: current,
                        tolerance,
                    },
                ),
            };

            windows.severity(run)
        })
        .collect()
}

/// Timeseries QC test that checks for stretches of near-constant values.
///
/// `suspect_threshold` and `fail_threshold` are durations in the units of `times`. They are
/// converted to a number of observations using the median interval between timestamps. An
/// observation is flagged [`Flag::Fail`] if it and at least that many of its immediate
/// predecessors for `fail_threshold` form a flat window according to `variant`,
/// [`Flag::Suspect`] if the same holds for `suspect_threshold`, else [`Flag::Pass`]. Missing
/// (`None` or non-finite) observations are flagged [`Flag::Missing`], and break any window they
/// fall into, so the first observation of a series, or after a gap, always passes.
///
/// If `values` is empty, an empty vec is returned regardless of `times`.
///
/// ## Errors
///
/// - `tolerance` is negative or NaN
/// - `suspect_threshold` is not positive, or `fail_threshold` is less than it
/// - `values` and `times` have different lengths
/// - `times` contains NaN or infinite values, or decreases
pub fn flatline_check(
    variant: FlatlineVariant,
    values: &[Option<f32>],
    times: &[f64],
    tolerance: f32,
    suspect_threshold: f64,
    fail_threshold: f64,
) -> Result<Vec<Flag>, Error> {
    FlatlineConfig::new(tolerance, suspect_threshold, fail_threshold)?;

    if values.is_empty() {
        return Ok(Vec::new());
    }
    if values.len() != times.len() {
        return Err(Error::InvalidInputShape("times".to_string()));
    }
    util::check_times(times)?;

    let windows = Windows::from_times(times, suspect_threshold, fail_threshold);

    Ok(flag_series(values, windows, variant, tolerance))
}

/// Apply [`flatline_check`] to a whole [`DataCache`]
///
/// The windows are sized once from the shared time axis. Series that are empty produce empty
/// flag vecs.
///
/// ## Errors
///
/// - any of the errors listed for [`flatline_check`]
/// - a non-empty series does not match the length of `cache.times`, in which case the error
///   names the series
pub fn flatline_check_cache(
    cache: &DataCache,
    variant: FlatlineVariant,
    tolerance: f32,
    suspect_threshold: f64,
    fail_threshold: f64,
) -> Result<Vec<(String, Vec<Flag>)>, Error> {
    FlatlineConfig::new(tolerance, suspect_threshold, fail_threshold)?;

    let mut result_vec = Vec::with_capacity(cache.data.len());
    // if this is empty, we can just return an empty result vec
    if cache.data.is_empty() {
        return Ok(result_vec);
    }

    if let Some((name, _)) = cache
        .data
        .iter()
        .find(|(_, values)| !values.is_empty() && values.len() != cache.times.len())
    {
        return Err(Error::InvalidInputShape(name.clone()));
    }
    util::check_times(&cache.times)?;

    let windows = Windows::from_times(&cache.times, suspect_threshold, fail_threshold);

    for (name, values) in cache.data.iter() {
        trace!(series = %name, ?variant, "running flat line check");
        result_vec.push((
            name.clone(),
            flag_series(values, windows, variant, tolerance),
        ));
    }

    Ok(result_vec)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMES: [f64; 10] = [1., 2., 3., 4., 5., 6., 7., 8., 9., 10.];

    fn codes(flags: Vec<Flag>) -> Vec<u8> {
        flags.into_iter().map(Flag::code).collect()
    }

    #[test]
    fn test_severity() {
        let windows = Windows {
            suspect_len: 2,
            fail_len: 4,
        };
        assert_eq!(windows.severity(0), Flag::Pass);
        assert_eq!(windows.severity(1), Flag::Pass);
        assert_eq!(windows.severity(2), Flag::Suspect);
        assert_eq!(windows.severity(3), Flag::Suspect);
        assert_eq!(windows.severity(4), Flag::Fail);
        assert_eq!(windows.severity(7), Flag::Fail);
    }

    #[test]
    fn test_windows_from_times() {
        assert_eq!(
            Windows::from_times(&[0., 600., 1200., 1800.], 1200., 3000.),
            Some(Windows {
                suspect_len: 2,
                fail_len: 5,
            })
        );
        assert_eq!(Windows::from_times(&[0.], 1., 2.), None);
        assert_eq!(Windows::from_times(&[5., 5., 5.], 1., 2.), None);
    }

    #[test]
    fn test_predicates() {
        let mut diff = Difference {
            current: 4.,
            tolerance: 4.,
        };
        // each is compared against the current value only
        assert!(diff.admit(5.));
        assert!(diff.admit(1.));
        assert!(!diff.admit(8.));
        assert!(!diff.admit(0.));

        let mut ptp = PeakToPeak {
            min: 4.,
            max: 4.,
            tolerance: 4.,
        };
        assert!(ptp.admit(5.));
        assert!(ptp.admit(1.5));
        // range would be 5 - 1 = 4
        assert!(!ptp.admit(1.));
        // a rejected value doesn't widen the window
        assert!(ptp.admit(2.));
    }

    #[test]
    fn test_flat_run_stops_at_missing() {
        let preceding = [Some(1.), Some(1.), None, Some(1.)];
        assert_eq!(
            flat_run(
                preceding.iter(),
                Difference {
                    current: 1.,
                    tolerance: 0.5,
                },
            ),
            2
        );
        let preceding = [Some(1.), Some(f32::NAN), Some(1.)];
        assert_eq!(
            flat_run(
                preceding.iter(),
                PeakToPeak {
                    min: 1.,
                    max: 1.,
                    tolerance: 0.5,
                },
            ),
            1
        );
    }

    #[test]
    fn test_variants_diverge_after_spike() {
        let values = [1f32, 1., 1., 1., 1., 6., 5., 4., 3., 2.].map(Some);

        assert_eq!(
            codes(
                flatline_check(FlatlineVariant::PeakToPeak, &values, &TIMES, 4., 3., 6.).unwrap()
            ),
            vec![1, 1, 1, 3, 3, 1, 1, 1, 3, 3]
        );
        assert_eq!(
            codes(
                flatline_check(FlatlineVariant::Difference, &values, &TIMES, 4., 3., 6.).unwrap()
            ),
            vec![1, 1, 1, 3, 3, 1, 1, 4, 4, 3]
        );
    }

    #[test]
    fn test_tolerance_is_exclusive() {
        let values = [1f32, 1.5, 1., 1.5, 1.].map(Some);
        for variant in [FlatlineVariant::Difference, FlatlineVariant::PeakToPeak] {
            assert_eq!(
                flatline_check(variant, &values, &TIMES[..5], 0.5, 1., 2.).unwrap(),
                vec![Flag::Pass; 5]
            );
        }
    }

    #[test]
    fn test_zero_tolerance_never_flags() {
        let values = [Some(2.); 6];
        assert_eq!(
            flatline_check(FlatlineVariant::Difference, &values, &TIMES[..6], 0., 1., 2.)
                .unwrap(),
            vec![Flag::Pass; 6]
        );
    }

    #[test]
    fn test_uneven_sampling_uses_median_interval() {
        // median interval is 10, so 20 and 40 mean 2 and 4 preceding observations
        let times = [0., 10., 20., 35., 45., 55.];
        let values = [Some(7.); 6];
        assert_eq!(
            flatline_check(FlatlineVariant::PeakToPeak, &values, &times, 0.1, 20., 40.).unwrap(),
            vec![
                Flag::Pass,
                Flag::Pass,
                Flag::Suspect,
                Flag::Suspect,
                Flag::Fail,
                Flag::Fail
            ]
        );
    }

    #[test]
    fn test_threshold_shorter_than_interval() {
        let values = [Some(7.); 3];
        assert_eq!(
            flatline_check(FlatlineVariant::Difference, &values, &[0., 60., 120.], 0.1, 1., 1.)
                .unwrap(),
            vec![Flag::Pass, Flag::Fail, Flag::Fail]
        );
    }

    #[test]
    fn test_constant_timestamps() {
        let values = [Some(1.), None, Some(1.)];
        assert_eq!(
            flatline_check(FlatlineVariant::PeakToPeak, &values, &[3., 3., 3.], 1., 1., 2.)
                .unwrap(),
            vec![Flag::Pass, Flag::Missing, Flag::Pass]
        );
    }

    #[test]
    fn test_invalid_args() {
        let values = [Some(1.); 3];
        let times = [1., 2., 3.];
        let variant = FlatlineVariant::Difference;

        assert!(matches!(
            flatline_check(variant, &values, &times, -0.1, 1., 2.),
            Err(Error::InvalidArg(..))
        ));
        assert!(matches!(
            flatline_check(variant, &values, &times, 0.1, 0., 2.),
            Err(Error::InvalidArg(..))
        ));
        assert!(matches!(
            flatline_check(variant, &values, &times, 0.1, 3., 2.),
            Err(Error::InvalidArg(..))
        ));
        assert_eq!(
            flatline_check(variant, &values, &times[..2], 0.1, 1., 2.),
            Err(Error::InvalidInputShape("times".to_string()))
        );
        assert!(matches!(
            flatline_check(variant, &values, &[1., 3., 2.], 0.1, 1., 2.),
            Err(Error::InvalidArg(..))
        ));
        assert_eq!(
            flatline_check(variant, &values[..2], &[0., f64::INFINITY], 0.5, 100., 200.),
            Err(Error::InvalidArg(
                "times".to_string(),
                "contains non-finite values".to_string()
            ))
        );
        // thresholds are checked even when there is nothing to QC
        assert!(flatline_check(variant, &[], &[], 0.1, 3., 2.).is_err());
    }

    #[test]
    fn test_flatline_check_cache() {
        let cache = DataCache::new(
            vec![0., 1., 2., 3., 4.],
            vec![
                ("blindern1".to_string(), vec![Some(0.); 5]),
                (
                    "blindern2".to_string(),
                    vec![Some(0.), Some(1.), Some(2.), Some(3.), Some(4.)],
                ),
                (
                    "blindern3".to_string(),
                    vec![Some(0.), None, Some(0.), Some(0.), Some(0.)],
                ),
                ("blindern4".to_string(), vec![]),
            ],
        )
        .unwrap();

        assert_eq!(
            flatline_check_cache(&cache, FlatlineVariant::Difference, 0.5, 2., 4.).unwrap(),
            vec![
                (
                    "blindern1".to_string(),
                    vec![
                        Flag::Pass,
                        Flag::Pass,
                        Flag::Suspect,
                        Flag::Suspect,
                        Flag::Fail
                    ]
                ),
                ("blindern2".to_string(), vec![Flag::Pass; 5]),
                (
                    "blindern3".to_string(),
                    vec![
                        Flag::Pass,
                        Flag::Missing,
                        Flag::Pass,
                        Flag::Pass,
                        Flag::Suspect
                    ]
                ),
                ("blindern4".to_string(), vec![]),
            ]
        );
    }

    #[test]
    fn test_flatline_check_cache_shape() {
        let cache = DataCache {
            times: vec![0., 1., 2.],
            data: vec![("blindern1".to_string(), vec![Some(0.), Some(0.)])],
        };
        assert_eq!(
            flatline_check_cache(&cache, FlatlineVariant::PeakToPeak, 0.5, 1., 2.),
            Err(Error::InvalidInputShape("blindern1".to_string()))
        );

        let empty = DataCache {
            times: vec![0., 1.],
            data: Vec::new(),
        };
        assert_eq!(
            flatline_check_cache(&empty, FlatlineVariant::PeakToPeak, 0.5, 1., 2.),
            Ok(Vec::new())
        );
    }
}
