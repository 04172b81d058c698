//! Dotted `major.minor` version numbers.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A dotted `major.minor` version number.
///
/// Numbers are advisory ordering metadata: the ledger orders versions by
/// append sequence, and the generator guarantees each number is strictly
/// greater than its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersionNumber {
    /// Major component.
    pub major: u32,
    /// Minor component.
    pub minor: u32,
}

impl VersionNumber {
    /// The number given to the first version of every object.
    pub const FIRST: Self = Self::new(1, 0);

    /// Creates a version number.
    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Returns the number following this one, or `None` if the bumped
    /// component would overflow.
    #[must_use]
    pub const fn bump(self, major: bool) -> Option<Self> {
        if major {
            match self.major.checked_add(1) {
                Some(next) => Some(Self::new(next, 0)),
                None => None,
            }
        } else {
            match self.minor.checked_add(1) {
                Some(next) => Some(Self::new(self.major, next)),
                None => None,
            }
        }
    }
}

/// Produces the next version number.
///
/// The first version of an object is always `1.0`, whatever `major` says.
///
/// # Errors
///
/// Returns `InvalidOperation` if `previous` has no successor.
pub fn next_version(previous: Option<VersionNumber>, major: bool) -> CoreResult<VersionNumber> {
    match previous {
        None => Ok(VersionNumber::FIRST),
        Some(prev) => prev.bump(major).ok_or_else(|| {
            CoreError::invalid_operation(format!("version {prev} has no successor"))
        }),
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for VersionNumber {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidVersionNumber {
            input: s.to_string(),
        };
        let (major, minor) = s.split_once('.').ok_or_else(invalid)?;
        let major = major.parse().map_err(|_| invalid())?;
        let minor = minor.parse().map_err(|_| invalid())?;
        Ok(Self::new(major, minor))
    }
}
