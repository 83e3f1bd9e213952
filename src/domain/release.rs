use std::fmt;
use std::str::FromStr;

use crate::error::{ReleaseError, Result};

/// Number of a release train (e.g. `12`)
///
/// Trains are numbered with positive integers. Build descriptors carry the
/// normalized form `<n>.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReleaseVersion(u32);

impl ReleaseVersion {
    /// Create a release version, rejecting zero
    pub fn new(number: u32) -> Result<Self> {
        if number == 0 {
            return Err(ReleaseError::validation(
                "release version must be a positive integer",
            ));
        }
        Ok(ReleaseVersion(number))
    }

    pub fn number(&self) -> u32 {
        self.0
    }

    /// Version string written into build descriptors (`12` -> `12.0`)
    pub fn normalized(&self) -> String {
        format!("{}.0", self.0)
    }

    /// The train this one follows, if any
    pub fn previous(&self) -> Option<ReleaseVersion> {
        if self.0 <= 1 {
            None
        } else {
            Some(ReleaseVersion(self.0 - 1))
        }
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ReleaseVersion {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let number = trimmed.parse::<u32>().map_err(|_| {
            ReleaseError::validation(format!(
                "'{}' is not a release number (expected a positive integer such as 12)",
                s
            ))
        })?;
        ReleaseVersion::new(number)
    }
}
