//! Password required after sleep or screensaver.

use async_trait::async_trait;
use posture_core::{Probe, ProbeState, Result};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::host::Host;

/// Desktop settings backends, tried in order; the first one present decides.
const BACKENDS: [(&str, &[&str]); 2] = [
    (
        "gsettings",
        &["get", "org.gnome.desktop.screensaver", "lock-enabled"],
    ),
    (
        "kreadconfig5",
        &["--file", "kscreenlockerrc", "--group", "Daemon", "--key", "Autolock"],
    ),
];

/// Passes when the desktop locks the screen behind a password.
pub struct ScreenLock {
    host: Arc<dyn Host>,
    state: ProbeState,
}

impl ScreenLock {
    /// Probe over the given host
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self {
            host,
            state: ProbeState::default(),
        }
    }

    async fn lock_enabled(&self) -> bool {
        for (program, args) in BACKENDS {
            if self.host.which(program).is_none() {
                continue;
            }
            return match self.host.command(program, args).await {
                Ok(out) => {
                    debug!(program, value = out.trimmed(), "screen lock setting");
                    out.trimmed() == "true"
                }
                Err(e) => {
                    warn!(program, error = %e, "could not read screen lock setting");
                    false
                }
            };
        }
        false
    }
}

#[async_trait]
impl Probe for ScreenLock {
    fn uuid(&self) -> &str {
        "37dee029-605b-4aab-96b9-5438e5aa44d8"
    }

    fn name(&self) -> &str {
        "Password is required to unlock the screen"
    }

    fn passed_message(&self) -> &str {
        "Password after sleep or screensaver is on"
    }

    fn failed_message(&self) -> &str {
        "Password after sleep or screensaver is off"
    }

    async fn is_runnable(&self) -> bool {
        true
    }

    async fn run(&mut self) -> Result<()> {
        let passed = self.lock_enabled().await;
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

    #[tokio::test]
    async fn gnome_lock_enabled_passes() {
        let host = FakeHost::new().command(
            "gsettings get org.gnome.desktop.screensaver lock-enabled",
            CommandOutput::ok("true\n"),
        );
        let mut probe = ScreenLock::new(Arc::new(host));
        probe.run().await.unwrap();
        assert!(probe.passed());
        assert_eq!(probe.status(), probe.passed_message());
    }

    #[tokio::test]
    async fn gnome_takes_precedence_over_kde() {
        let host = FakeHost::new()
            .command(
                "gsettings get org.gnome.desktop.screensaver lock-enabled",
                CommandOutput::ok("false\n"),
            )
            .command(
                "kreadconfig5 --file kscreenlockerrc --group Daemon --key Autolock",
                CommandOutput::ok("true\n"),
            );
        let mut probe = ScreenLock::new(Arc::new(host));
        probe.run().await.unwrap();
        assert!(!probe.passed());
    }

    #[tokio::test]
    async fn kde_autolock_passes() {
        let host = FakeHost::new().command(
            "kreadconfig5 --file kscreenlockerrc --group Daemon --key Autolock",
            CommandOutput::ok("true"),
        );
        let mut probe = ScreenLock::new(Arc::new(host));
        probe.run().await.unwrap();
        assert!(probe.passed());
    }

    #[tokio::test]
    async fn no_desktop_fails() {
        let mut probe = ScreenLock::new(Arc::new(FakeHost::new()));
        probe.run().await.unwrap();
        assert!(!probe.passed());
        assert_eq!(probe.status(), "Password after sleep or screensaver is off");
    }
}
