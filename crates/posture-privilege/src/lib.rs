//! Root-privilege delegation for the posture auditor.
//!
//! Probes that need root are not run in the unprivileged process. Instead the
//! [`HelperClient`] asks a one-shot [`Helper`], started by the service manager
//! behind a Unix socket, to run them and report back a single boolean.

mod client;
mod config;
mod helper;
pub mod protocol;

pub use client::HelperClient;
pub use config::{HelperConfig, DEFAULT_SOCKET_PATH, MAX_MESSAGE_BYTES};
pub use helper::{bind, inherited_listener, Helper, HelperDecision};
pub use posture_core::{PostureError, Result};

/// Whether this process already runs with an effective uid of root
#[must_use]
pub fn is_elevated() -> bool {
    nix::unistd::geteuid().is_root()
}
