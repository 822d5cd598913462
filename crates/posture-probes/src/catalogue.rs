//! The built-in catalogue of Linux probes, grouped into claims.

use posture_core::{ProbeHandle, Registry, Result};
use std::sync::Arc;

use crate::autologin::Autologin;
use crate::disk_encryption::DiskEncryption;
use crate::exposure::{FileSharing, RemoteLogin};
use crate::firewall::Firewall;
use crate::host::Host;
use crate::kernel::KernelParams;
use crate::screen_lock::ScreenLock;
use crate::secure_boot::SecureBoot;
use crate::ssh_keys::SshKeyStrength;
use crate::updates::SoftwareUpdates;

/// Claim holding login and credential probes
pub const ACCESS_SECURITY: &str = "Access Security";
/// Claim holding package freshness probes
pub const SOFTWARE_UPDATES: &str = "Software Updates";
/// Claim holding network exposure probes
pub const FIREWALL_AND_SHARING: &str = "Firewall & Sharing";
/// Claim holding boot chain and kernel probes
pub const SYSTEM_INTEGRITY: &str = "System Integrity";

/// Register every built-in probe into `registry`
pub fn register_defaults(registry: &mut Registry, host: &Arc<dyn Host>) -> Result<()> {
    let h = || Arc::clone(host);

    registry.register(ACCESS_SECURITY, ProbeHandle::new(Autologin::new(h())))?;
    registry.register(ACCESS_SECURITY, ProbeHandle::new(ScreenLock::new(h())))?;
    registry.register(ACCESS_SECURITY, ProbeHandle::new(SshKeyStrength::new(h())))?;

    registry.register(SOFTWARE_UPDATES, ProbeHandle::new(SoftwareUpdates::new(h())))?;

    registry.register(FIREWALL_AND_SHARING, ProbeHandle::new(Firewall::new(h())))?;
    registry.register(FIREWALL_AND_SHARING, ProbeHandle::new(RemoteLogin::new(h())))?;
    registry.register(FIREWALL_AND_SHARING, ProbeHandle::new(FileSharing::new(h())))?;

    registry.register(SYSTEM_INTEGRITY, ProbeHandle::new(SecureBoot::new(h())))?;
    registry.register(SYSTEM_INTEGRITY, ProbeHandle::new(DiskEncryption::new(h())))?;
    registry.register(SYSTEM_INTEGRITY, ProbeHandle::new(KernelParams::new(h())))?;

    Ok(())
}

/// A fresh registry holding every built-in probe
pub fn default_registry(host: Arc<dyn Host>) -> Result<Registry> {
    let mut registry = Registry::new();
    register_defaults(&mut registry, &host)?;
    Ok(registry)
}
