//! Flat line detection for time series of sensor observations.
//!
//! The flat line test flags stretches of readings that fail to vary beyond a
//! tolerance for longer than a threshold duration, which usually means a stuck
//! sensor. Two definitions of "not varying" are offered through
//! [`FlatlineVariant`]; they agree on most series but deliberately diverge
//! around spikes.

// #![deny(missing_docs)]

use thiserror::Error;

/// QC checks, grouped by the shape of data they operate on.
pub mod checks;
pub use checks::series::{flatline_check, flatline_check_cache, FlatlineVariant};

mod config;
pub use config::FlatlineConfig;

mod flag;
pub use flag::Flag;

mod util;
pub use util::DataCache;

/// Error type for flatline
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The shape of an input value is not valid
    #[error("input vector {0} does not have compatible size")]
    InvalidInputShape(String),
    /// An argument has an invalid value
    #[error("argument {0} does not have a valid value: {1}")]
    InvalidArg(String, String),
}
