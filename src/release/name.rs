// ABOUTME: Release directory names.
// ABOUTME: Fixed-width UTC timestamps so lexicographic order is creation order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// `strftime` format of generated release names.
pub const RELEASE_NAME_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReleaseNameError {
    #[error("release name cannot be empty")]
    Empty,

    #[error("release name cannot be `.` or `..`")]
    Relative,

    #[error("invalid character in release name: {0:?}")]
    InvalidChar(char),
}

/// Name of one release directory under `releases/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ReleaseName(String);

impl ReleaseName {
    /// Accept any single path component; listings may contain names that
    /// were not generated here.
    pub fn new(value: &str) -> Result<Self, ReleaseNameError> {
        if value.is_empty() {
            return Err(ReleaseNameError::Empty);
        }
        if value == "." || value == ".." {
            return Err(ReleaseNameError::Relative);
        }
        if let Some(c) = value
            .chars()
            .find(|c| *c == '/' || c.is_whitespace() || c.is_control())
        {
            return Err(ReleaseNameError::InvalidChar(c));
        }
        Ok(Self(value.to_string()))
    }

    /// Name for a release created at `time`.
    pub fn from_time(time: DateTime<Utc>) -> Self {
        Self(time.format(RELEASE_NAME_FORMAT).to_string())
    }

    /// Name for a release created now.
    pub fn generate() -> Self {
        Self::from_time(Utc::now())
    }

    /// Whether this name follows the generated timestamp format.
    pub fn is_timestamp(&self) -> bool {
        self.0.len() == 14 && self.0.bytes().all(|b| b.is_ascii_digit())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReleaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
