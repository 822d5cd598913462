//! Linux security probes for the posture auditor.
//!
//! Every probe observes the machine through the [`Host`] trait, so the same
//! probe runs against [`SystemHost`] in production and a scripted host in
//! tests. [`default_registry`] builds the full catalogue.

mod autologin;
mod catalogue;
mod disk_encryption;
mod error;
mod exposure;
mod firewall;
mod host;
mod kernel;
pub mod ports;
mod screen_lock;
mod secure_boot;
pub mod ssh_keys;
mod updates;

#[cfg(test)]
mod testing;

pub use autologin::Autologin;
pub use catalogue::{
    default_registry, register_defaults, ACCESS_SECURITY, FIREWALL_AND_SHARING, SOFTWARE_UPDATES,
    SYSTEM_INTEGRITY,
};
pub use disk_encryption::DiskEncryption;
pub use error::{ProbeError, ProbeResult};
pub use exposure::{FileSharing, RemoteLogin};
pub use firewall::Firewall;
pub use host::{CommandOutput, Host, SystemHost};
pub use kernel::KernelParams;
pub use screen_lock::ScreenLock;
pub use secure_boot::SecureBoot;
pub use ssh_keys::SshKeyStrength;
pub use updates::SoftwareUpdates;
