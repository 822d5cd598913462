//! Delegation channel configuration.

use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

/// Socket path the service manager listens on by default
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/posture.sock";

/// Upper bound on a single request or response line
pub const MAX_MESSAGE_BYTES: u64 = 4096;

/// Settings shared by the helper client and the helper itself
#[derive(Debug, Clone)]
pub struct HelperConfig {
    /// Unix socket path of the helper
    pub socket_path: PathBuf,

    /// Delegated calls allowed per second, client side
    pub calls_per_second: NonZeroU32,

    /// Time allowed to establish the connection
    pub connect_timeout: Duration,

    /// Time allowed for one full request/response exchange
    pub request_timeout: Duration,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl HelperConfig {
    /// Create a configuration with default settings
    #[must_use]
    pub fn new() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            calls_per_second: NonZeroU32::MIN,
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Set the socket path
    #[must_use]
    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = path.into();
        self
    }

    /// Set the client-side call rate; zero is raised to one
    #[must_use]
    pub const fn calls_per_second(mut self, rate: u32) -> Self {
        self.calls_per_second = match NonZeroU32::new(rate) {
            Some(rate) => rate,
            None => NonZeroU32::MIN,
        };
        self
    }

    /// Set the connect timeout
    #[must_use]
    pub const fn connect_timeout(mut self, duration: Duration) -> Self {
        self.connect_timeout = duration;
        self
    }

    /// Set the request timeout
    #[must_use]
    pub const fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = duration;
        self
    }
}
