use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error as ThisError;

///
/// VersionError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum VersionError {
    #[error("invalid version string '{0}', expected 'major.minor'")]
    Invalid(String),
}

///
/// Version
///
/// Declared document version. Ordering is lexicographic, major then minor;
/// the serialized name of a kind may differ per major version.
///

#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
}

/// First major format version; legacy kind names apply here.
pub const V1: Version = Version::new(1, 0);

/// Current major format version.
pub const V2: Version = Version::new(2, 0);

impl Version {
    #[must_use]
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Returns `true` if this version is the same as or later than `other`.
    #[must_use]
    pub fn at_least(self, other: Self) -> bool {
        self >= other
    }
}

impl Default for Version {
    fn default() -> Self {
        V2
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || VersionError::Invalid(s.to_string());
        let (major, minor) = s.split_once('.').ok_or_else(err)?;

        Ok(Self {
            major: major.parse().map_err(|_| err())?,
            minor: minor.parse().map_err(|_| err())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_major_minor() {
        assert_eq!("1.0".parse::<Version>(), Ok(V1));
        assert_eq!("2.3".parse::<Version>(), Ok(Version::new(2, 3)));
    }

    #[test]
    fn rejects_malformed_strings() {
        for bad in ["", "2", "a.b", "1.2.3"] {
            assert!(bad.parse::<Version>().is_err(), "accepted '{bad}'");
        }
    }

    #[test]
    fn orders_major_then_minor() {
        assert!(Version::new(2, 0).at_least(Version::new(1, 9)));
        assert!(Version::new(1, 2).at_least(Version::new(1, 2)));
        assert!(!Version::new(1, 1).at_least(Version::new(1, 2)));
    }
}
