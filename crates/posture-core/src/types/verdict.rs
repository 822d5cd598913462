//! Per-probe verdicts for the machine-readable run summary.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// What a single run decided about one probe.
///
/// Serializes to `"passed"`, `"failed"`, `"skipped"` or the literal error
/// message, which is the summary format external tools consume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The security property holds
    Passed,
    /// The security property is absent
    Failed,
    /// The probe cannot run on this host
    Skipped,
    /// The probe mechanism could not execute
    Errored(String),
}

impl Verdict {
    /// Build a verdict from a finished probe outcome
    #[must_use]
    pub const fn from_passed(passed: bool) -> Self {
        if passed {
            Self::Passed
        } else {
            Self::Failed
        }
    }

    /// Summary string for this verdict
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Errored(msg) => msg,
        }
    }

    /// Returns true for verdicts produced by an actual execution
    #[must_use]
    pub const fn was_executed(&self) -> bool {
        !matches!(self, Self::Skipped)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Verdict {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Verdict {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "passed" => Self::Passed,
            "failed" => Self::Failed,
            "skipped" => Self::Skipped,
            _ => Self::Errored(raw),
        })
    }
}
