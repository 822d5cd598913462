use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for posture operations
pub type Result<T> = std::result::Result<T, PostureError>;

/// Errors that can occur while registering, running or persisting checks
#[derive(Error, Debug)]
pub enum PostureError {
    /// Two different probe instances share one id
    #[error("duplicate probe id {uuid}: already registered as \"{existing}\"")]
    DuplicateProbe {
        /// The clashing id
        uuid: String,
        /// Name of the probe that owns the id
        existing: String,
    },

    /// The same probe instance was registered under two claims
    #[error("probe {uuid} already belongs to claim \"{claim}\"")]
    ProbeInMultipleClaims {
        /// Probe id
        uuid: String,
        /// Claim the probe already belongs to
        claim: String,
    },

    /// An external command could not be executed
    #[error("command `{program}` failed: {message}")]
    Command {
        /// Program that was invoked
        program: String,
        /// What went wrong
        message: String,
    },

    /// The probe mechanism itself failed
    #[error("probe error: {0}")]
    Probe(String),

    /// The privileged helper socket could not be reached
    #[error(
        "root helper is not available at {}: {reason}. \
         Install and enable the posture helper socket unit so that checks \
         requiring root can run",
        socket.display()
    )]
    HelperUnavailable {
        /// Socket path that was dialed
        socket: PathBuf,
        /// Underlying failure
        reason: String,
    },

    /// The helper answered with something that is not a valid response
    #[error("malformed response from root helper: {0}")]
    HelperProtocol(String),

    /// The helper refused to run the requested probe
    #[error("root helper declined to run probe {uuid}")]
    HelperDeclined {
        /// Requested probe id
        uuid: String,
    },

    /// The whole run exceeded its deadline
    #[error("check run timed out after {}s with {outstanding} probe(s) outstanding", timeout.as_secs_f64())]
    RunTimedOut {
        /// Deadline that was exceeded
        timeout: Duration,
        /// Units of work that had not finished
        outstanding: usize,
    },

    /// Last-state file could not be read, decoded or written
    #[error("state error: {0}")]
    State(String),

    /// Configuration is invalid or unreadable
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PostureError {
    /// Returns true if the error means a probe could not be executed at all
    #[must_use]
    pub const fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::Command { .. } | Self::Probe(_) | Self::Io(_) | Self::Json(_)
        ) || self.is_delegation()
    }

    /// Returns true if the error comes from the privilege delegation channel
    #[must_use]
    pub const fn is_delegation(&self) -> bool {
        matches!(
            self,
            Self::HelperUnavailable { .. } | Self::HelperProtocol(_) | Self::HelperDeclined { .. }
        )
    }

    /// Returns true if the error should fail the whole process
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::RunTimedOut { .. })
    }

    /// Shorthand for a command failure
    pub fn command(program: impl Into<String>, message: impl ToString) -> Self {
        Self::Command {
            program: program.into(),
            message: message.to_string(),
        }
    }
}
