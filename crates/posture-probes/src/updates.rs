//! Pending package updates across the package managers found on the host.

use async_trait::async_trait;
use posture_core::{Probe, ProbeState, Result};
use std::sync::Arc;
use tracing::debug;

use crate::host::{CommandOutput, Host};

/// A package manager and how to tell that it has updates waiting.
struct Source {
    label: &'static str,
    program: &'static str,
    args: &'static [&'static str],
    pending: fn(&CommandOutput) -> bool,
}

const SOURCES: &[Source] = &[
    Source {
        label: "Flatpak",
        program: "flatpak",
        args: &["remote-ls", "--updates"],
        pending: |out| out.success() && !out.trimmed().is_empty(),
    },
    Source {
        label: "APT",
        program: "apt",
        args: &["list", "--upgradable"],
        pending: |out| out.success() && out.stdout.contains("upgradable from"),
    },
    Source {
        label: "DNF",
        program: "dnf",
        args: &["check-update", "--quiet"],
        pending: |out| out.code == Some(100),
    },
    Source {
        label: "Pacman",
        program: "pacman",
        args: &["-Qu"],
        pending: |out| out.success() && !out.trimmed().is_empty(),
    },
    Source {
        label: "Snap",
        program: "snap",
        args: &["refresh", "--list"],
        pending: |out| {
            out.success()
                && !out.trimmed().is_empty()
                && !out.stdout.contains("All snaps up to date.")
                && !out.stderr.contains("All snaps up to date.")
        },
    },
];

/// Passes when no installed package manager reports pending updates.
pub struct SoftwareUpdates {
    host: Arc<dyn Host>,
    state: ProbeState,
}

impl SoftwareUpdates {
    /// Probe over the given host
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self {
            host,
            state: ProbeState::default(),
        }
    }

    async fn outdated(&self) -> Vec<&'static str> {
        let mut labels = Vec::new();
        for source in SOURCES {
            if self.host.which(source.program).is_none() {
                continue;
            }
            match self.host.command(source.program, source.args).await {
                Ok(out) if (source.pending)(&out) => {
                    debug!(source = source.label, "updates pending");
                    labels.push(source.label);
                }
                Ok(_) => {}
                Err(e) => debug!(source = source.label, error = %e, "could not query"),
            }
        }
        labels
    }
}

#[async_trait]
impl Probe for SoftwareUpdates {
    fn uuid(&self) -> &str {
        "7436553a-ae52-479b-937b-2ae14d15a520"
    }

    fn name(&self) -> &str {
        "Apps are up to date"
    }

    fn passed_message(&self) -> &str {
        "All apps are up to date"
    }

    fn failed_message(&self) -> &str {
        "Some apps are out of date"
    }

    async fn is_runnable(&self) -> bool {
        true
    }

    async fn run(&mut self) -> Result<()> {
        let outdated = self.outdated().await;
        if outdated.is_empty() {
            self.state.pass(self.passed_message().to_string());
        } else {
            self.state
                .fail(format!("Updates available for: {}", outdated.join(", ")));
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
    use crate::testing::FakeHost;

    #[tokio::test]
    async fn up_to_date_managers_pass() {
        let host = FakeHost::new()
            .command("apt list --upgradable", CommandOutput::ok("Listing... Done\n"))
            .command("dnf check-update --quiet", CommandOutput::exit(0, ""))
            .command("snap refresh --list", CommandOutput::ok("All snaps up to date.\n"));
        let mut probe = SoftwareUpdates::new(Arc::new(host));
        probe.run().await.unwrap();
        assert!(probe.passed());
        assert_eq!(probe.status(), "All apps are up to date");
    }

    #[tokio::test]
    async fn lists_every_outdated_source() {
        let host = FakeHost::new()
            .command(
                "apt list --upgradable",
                CommandOutput::ok("Listing... Done\nopenssl/stable 3.0.2 amd64 [upgradable from: 3.0.1]\n"),
            )
            .command("dnf check-update --quiet", CommandOutput::exit(100, "kernel.x86_64 6.9\n"))
            .command("flatpak remote-ls --updates", CommandOutput::ok(""));
        let mut probe = SoftwareUpdates::new(Arc::new(host));
        probe.run().await.unwrap();
        assert!(!probe.passed());
        assert_eq!(probe.status(), "Updates available for: APT, DNF");
    }

    #[tokio::test]
    async fn failing_manager_is_not_a_finding() {
        let host = FakeHost::new()
            .command("pacman -Qu", CommandOutput::exit(1, ""))
            .program("snap");
        let mut probe = SoftwareUpdates::new(Arc::new(host));
        probe.run().await.unwrap();
        assert!(probe.passed());
    }
}
