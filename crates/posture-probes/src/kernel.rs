//! Kernel hardening sysctls.

use async_trait::async_trait;
use posture_core::{Probe, ProbeState, Result};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::debug;

use crate::error::ProbeError;
use crate::host::Host;

/// Sysctl name and the value it must have
const EXPECTED: [(&str, &str); 4] = [
    ("net.ipv4.tcp_syncookies", "1"),
    ("kernel.randomize_va_space", "2"),
    ("fs.protected_hardlinks", "1"),
    ("fs.protected_symlinks", "1"),
];

/// Passes when every hardening sysctl has its expected value.
pub struct KernelParams {
    host: Arc<dyn Host>,
    state: ProbeState,
}

impl KernelParams {
    /// Probe over the given host
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self {
            host,
            state: ProbeState::default(),
        }
    }

    async fn sysctl(&self, name: &str) -> std::result::Result<String, ProbeError> {
        let out = self.host.command("sysctl", &["-n", name]).await?;
        if !out.success() {
            return Err(ProbeError::command("sysctl", out.stderr.trim()));
        }
        Ok(out.trimmed().to_string())
    }
}

#[async_trait]
impl Probe for KernelParams {
    fn uuid(&self) -> &str {
        "cbf2736b-72df-43e3-8789-8eb676ff9014"
    }

    fn name(&self) -> &str {
        "Kernel Parameters are set correctly"
    }

    fn passed_message(&self) -> &str {
        "Critical kernel parameters are correct"
    }

    fn failed_message(&self) -> &str {
        "Critical kernel parameters are not correct"
    }

    fn requires_root(&self) -> bool {
        true
    }

    fn report_if_disabled(&self) -> bool {
        true
    }

    async fn is_runnable(&self) -> bool {
        self.host.which("sysctl").is_some()
    }

    async fn run(&mut self) -> Result<()> {
        let mut mismatches = String::new();
        for (name, expected) in EXPECTED {
            let value = self.sysctl(name).await?;
            debug!(name, value = %value, "sysctl");
            if value != expected {
                let _ = write!(mismatches, "{name} is set to {value} but should be {expected}. ");
            }
        }

        if mismatches.is_empty() {
            self.state.pass(self.passed_message().to_string());
        } else {
            self.state.fail(mismatches.trim_end());
        }
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

    fn host_with(values: [&str; 4]) -> FakeHost {
        EXPECTED
            .iter()
            .zip(values)
            .fold(FakeHost::new(), |host, ((name, _), value)| {
                host.command(&format!("sysctl -n {name}"), CommandOutput::ok(format!("{value}\n")))
            })
    }

    #[tokio::test]
    async fn hardened_kernel_passes() {
        let mut probe = KernelParams::new(Arc::new(host_with(["1", "2", "1", "1"])));
        assert!(probe.is_runnable().await);
        probe.run().await.unwrap();
        assert!(probe.passed());
        assert_eq!(probe.status(), "Critical kernel parameters are correct");
    }

    #[tokio::test]
    async fn lists_every_mismatch() {
        let mut probe = KernelParams::new(Arc::new(host_with(["0", "2", "1", "0"])));
        probe.run().await.unwrap();
        assert!(!probe.passed());
        assert_eq!(
            probe.status(),
            "net.ipv4.tcp_syncookies is set to 0 but should be 1. \
             fs.protected_symlinks is set to 0 but should be 1."
        );
    }

    #[tokio::test]
    async fn unreadable_sysctl_is_an_error() {
        let host = FakeHost::new().command(
            "sysctl -n net.ipv4.tcp_syncookies",
            CommandOutput {
                code: Some(255),
                stdout: String::new(),
                stderr: "sysctl: cannot stat /proc/sys/net/ipv4/tcp_syncookies".into(),
            },
        );
        let mut probe = KernelParams::new(Arc::new(host));
        assert!(probe.run().await.is_err());
    }
}
