mod flatline_check;
pub use flatline_check::{flatline_check, flatline_check_cache, FlatlineVariant};
