use crate::Error;
use std::fmt::{self, Display};

/// Flag indicating result of a QC test for a given data point
///
/// Discriminants are the standard QARTOD flag codes, see [`Flag::code`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
#[repr(u8)]
#[non_exhaustive]
pub enum Flag {
    /// The data point passed the QC test with no issues
    Pass = 1,
    /// The QC test was not run on this data point
    NotEvaluated = 2,
    /// The data point did not fail, but is questionable
    Suspect = 3,
    /// The data point failed the QC test
    Fail = 4,
    /// The data point itself was missing
    Missing = 9,
}

impl Flag {
    /// QARTOD code of the flag
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Flag {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Flag::Pass),
            2 => Ok(Flag::NotEvaluated),
            3 => Ok(Flag::Suspect),
            4 => Ok(Flag::Fail),
            9 => Ok(Flag::Missing),
            _ => Err(Error::InvalidArg(
                "code".to_string(),
                format!("{code} is not a QARTOD flag"),
            )),
        }
    }
}

impl From<Flag> for u8 {
    fn from(flag: Flag) -> Self {
        flag.code()
    }
}

impl Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Flag::Pass => "PASS",
            Flag::NotEvaluated => "NOT_EVALUATED",
            Flag::Suspect => "SUSPECT",
            Flag::Fail => "FAIL",
            Flag::Missing => "MISSING",
        };
        f.write_str(name)
    }
}
