//! Run-result state carried by probes.

use serde::{Deserialize, Serialize};

/// Outcome of one execution, as read back by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Whether the security property holds
    pub passed: bool,
    /// Human-readable detail
    pub detail: String,
}

/// Mutable run-result fields embedded in every probe.
///
/// The outcome stays `None` until the first run records one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeState {
    outcome: Option<bool>,
    detail: String,
}

impl ProbeState {
    /// Record a finished run
    pub fn record(&mut self, passed: bool, detail: impl Into<String>) {
        self.outcome = Some(passed);
        self.detail = detail.into();
    }

    /// Record a passing run with the given message
    pub fn pass(&mut self, detail: impl Into<String>) {
        self.record(true, detail);
    }

    /// Record a failing run with the given message
    pub fn fail(&mut self, detail: impl Into<String>) {
        self.record(false, detail);
    }

    /// Last outcome, `false` before the first run
    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcome.unwrap_or(false)
    }

    /// Last outcome, `None` before the first run
    #[must_use]
    pub const fn outcome(&self) -> Option<bool> {
        self.outcome
    }

    /// Last detail message, empty before the first run
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Forget the previous run
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
