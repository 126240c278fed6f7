//! Sticky per-item compliance state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What the verifier saw for one item on one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RawObservation {
    Compliant,
    NonCompliant,
    /// Item not visible or verifier unsure
    #[default]
    Unknown,
}

impl RawObservation {
    /// Parse a verifier status string, case-insensitively. Anything
    /// unrecognised is read as `Unknown`.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or(Self::Unknown)
    }
}

impl FromStr for RawObservation {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "COMPLIANT" => Ok(Self::Compliant),
            "NON_COMPLIANT" => Ok(Self::NonCompliant),
            "UNKNOWN" => Ok(Self::Unknown),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// A status string outside the three known values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognised compliance status {0:?}")]
pub struct UnknownStatus(pub String);

/// Verdict held for one (identity, item) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceState {
    #[default]
    Unknown,
    Compliant,
    NonCompliant,
}

impl ComplianceState {
    /// Transition function.
    ///
    /// An `Unknown` observation never erases a verdict; any confident
    /// observation replaces whatever was held before.
    #[must_use]
    pub fn next(self, observation: RawObservation) -> Self {
        match observation {
            RawObservation::Unknown => self,
            RawObservation::Compliant => Self::Compliant,
            RawObservation::NonCompliant => Self::NonCompliant,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Compliant => "COMPLIANT",
            Self::NonCompliant => "NON_COMPLIANT",
        }
    }
}

impl fmt::Display for ComplianceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
