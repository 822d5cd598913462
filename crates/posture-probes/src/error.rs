use posture_core::PostureError;
use thiserror::Error;

/// Result type alias for probe mechanics
pub type ProbeResult<T> = std::result::Result<T, ProbeError>;

/// Errors from the host facilities probes rely on
#[derive(Error, Debug)]
pub enum ProbeError {
    /// A program could not be spawned or reported a hard failure
    #[error("command `{program}` failed: {message}")]
    Command {
        /// Program that was invoked
        program: String,
        /// What went wrong
        message: String,
    },

    /// Something the probe needs is not present on this host
    #[error("missing: {0}")]
    Missing(String),

    /// Output of a tool could not be understood
    #[error("unexpected output: {0}")]
    Parse(String),

    /// File or socket I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    /// Shorthand for a command failure
    pub fn command(program: impl Into<String>, message: impl ToString) -> Self {
        Self::Command {
            program: program.into(),
            message: message.to_string(),
        }
    }
}

impl From<ProbeError> for PostureError {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::Command { program, message } => Self::Command { program, message },
            ProbeError::Missing(what) => Self::Probe(format!("{what} not found")),
            ProbeError::Parse(msg) => Self::Probe(msg),
            ProbeError::Io(e) => Self::Io(e),
        }
    }
}
