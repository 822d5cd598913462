//! LUKS block device encryption.

use async_trait::async_trait;
use posture_core::{Probe, ProbeState, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::error::ProbeError;
use crate::host::Host;

const CRYPTTAB: &str = "/etc/crypttab";
const CMDLINE: &str = "/proc/cmdline";

/// Source device identifiers of every `/etc/crypttab` entry.
///
/// The second field may be quoted and may carry a `UUID=` prefix.
fn crypttab_devices(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(|dev| {
            let dev = dev.trim_matches('"');
            dev.strip_prefix("UUID=").unwrap_or(dev).to_string()
        })
        .filter(|dev| !dev.is_empty())
        .collect()
}

/// Whether the kernel command line unlocks root through `cryptdevice=dev:name:root`
fn root_via_kernel(cmdline: &str) -> bool {
    cmdline
        .split_whitespace()
        .filter_map(|param| param.strip_prefix("cryptdevice="))
        .any(|spec| {
            let parts: Vec<&str> = spec.split(':').collect();
            parts.len() == 3 && parts[2] == "root"
        })
}

/// Passes when a LUKS device listed in crypttab is present. `blkid` needs
/// root to see every device.
pub struct DiskEncryption {
    host: Arc<dyn Host>,
    state: ProbeState,
}

impl DiskEncryption {
    /// Probe over the given host
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self {
            host,
            state: ProbeState::default(),
        }
    }

    async fn encrypted(&self) -> std::result::Result<bool, ProbeError> {
        let devices = self
            .host
            .read_to_string(Path::new(CRYPTTAB))
            .await
            .map(|body| crypttab_devices(&body))
            .unwrap_or_default();
        debug!(?devices, "crypttab entries");

        let blkid = self.host.command("blkid", &[]).await?;
        let luks_listed = blkid
            .stdout
            .lines()
            .filter(|line| line.contains("TYPE=\"crypto_LUKS\""))
            .any(|line| devices.iter().any(|dev| line.contains(dev.as_str())));
        if luks_listed {
            return Ok(true);
        }

        Ok(self
            .host
            .read_to_string(Path::new(CMDLINE))
            .await
            .is_ok_and(|cmdline| root_via_kernel(&cmdline)))
    }
}

#[async_trait]
impl Probe for DiskEncryption {
    fn uuid(&self) -> &str {
        "21830a4e-84f1-48fe-9c5b-beab436b2cdb"
    }

    fn name(&self) -> &str {
        "Filesystem encryption is enabled"
    }

    fn passed_message(&self) -> &str {
        "Block device encryption is enabled"
    }

    fn failed_message(&self) -> &str {
        "Block device encryption is disabled"
    }

    fn requires_root(&self) -> bool {
        true
    }

    fn report_if_disabled(&self) -> bool {
        true
    }

    async fn is_runnable(&self) -> bool {
        self.host.which("blkid").is_some()
    }

    async fn run(&mut self) -> Result<()> {
        let passed = self.encrypted().await?;
        let detail = if passed {
            self.passed_message().to_string()
        } else {
            self.failed_message().to_string()
        };
        self.state.record(passed, detail);
        Ok(())
    }

    fn passed(&self) -> bool {
        self.state.passed()
    }

    fn status(&self) -> String {
        self.state.detail().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::CommandOutput;
    use crate::testing::FakeHost;

    const BLKID: &str = "/dev/nvme0n1p1: UUID=\"7A1B-2C3D\" TYPE=\"vfat\"\n\
        /dev/nvme0n1p3: UUID=\"5e8f3c1a-9d2b-4e7f-a1c3-0b9d8e7f6a5c\" TYPE=\"crypto_LUKS\" PARTUUID=\"x\"\n";

    #[test]
    fn parses_crypttab_sources() {
        let body = "# <target> <source> <key> <options>\n\
            luks-5e8f UUID=5e8f3c1a-9d2b-4e7f-a1c3-0b9d8e7f6a5c none luks\n\
            \n\
            swap \"/dev/sda2\" /dev/urandom swap\n";
        assert_eq!(
            crypttab_devices(body),
            ["5e8f3c1a-9d2b-4e7f-a1c3-0b9d8e7f6a5c", "/dev/sda2"]
        );
    }

    #[test]
    fn empty_sources_are_dropped() {
        let body = "blank UUID= none luks\nquoted \"\" none luks\nreal /dev/sda3 none luks\n";
        assert_eq!(crypttab_devices(body), ["/dev/sda3"]);
    }

    #[tokio::test]
    async fn empty_crypttab_source_does_not_match_every_device() {
        let host = FakeHost::new()
            .file(CRYPTTAB, "blank UUID= none luks\nquoted \"\" none luks\n")
            .command("blkid", CommandOutput::ok(BLKID))
            .file(CMDLINE, "BOOT_IMAGE=/vmlinuz quiet");
        let mut probe = DiskEncryption::new(Arc::new(host));
        probe.run().await.unwrap();
        assert!(!probe.passed());
    }

    #[test]
    fn kernel_cryptdevice_needs_root_target() {
        assert!(root_via_kernel("quiet cryptdevice=/dev/sda2:cryptroot:root rw"));
        assert!(!root_via_kernel("cryptdevice=/dev/sda2:cryptroot quiet"));
        assert!(!root_via_kernel("quiet splash"));
    }

    #[tokio::test]
    async fn listed_luks_device_passes() {
        let host = FakeHost::new()
            .file(CRYPTTAB, "luks-5e8f UUID=5e8f3c1a-9d2b-4e7f-a1c3-0b9d8e7f6a5c none luks\n")
            .command("blkid", CommandOutput::ok(BLKID));
        let mut probe = DiskEncryption::new(Arc::new(host));
        assert!(probe.is_runnable().await);
        probe.run().await.unwrap();
        assert!(probe.passed());
    }

    #[tokio::test]
    async fn unlisted_luks_device_fails() {
        let host = FakeHost::new()
            .command("blkid", CommandOutput::ok(BLKID))
            .file(CMDLINE, "BOOT_IMAGE=/vmlinuz quiet");
        let mut probe = DiskEncryption::new(Arc::new(host));
        probe.run().await.unwrap();
        assert!(!probe.passed());
        assert_eq!(probe.status(), "Block device encryption is disabled");
    }

    #[tokio::test]
    async fn kernel_unlocked_root_passes() {
        let host = FakeHost::new()
            .command("blkid", CommandOutput::ok(""))
            .file(CMDLINE, "cryptdevice=UUID=abc:cryptroot:root rw");
        let mut probe = DiskEncryption::new(Arc::new(host));
        probe.run().await.unwrap();
        assert!(probe.passed());
    }

    #[tokio::test]
    async fn missing_blkid_is_an_error() {
        let mut probe = DiskEncryption::new(Arc::new(FakeHost::new()));
        assert!(!probe.is_runnable().await);
        assert!(probe.run().await.is_err());
    }
}
