//! Display-manager automatic login.

use async_trait::async_trait;
use posture_core::{Probe, ProbeState, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::host::Host;

const SDDM_DROP_INS: &str = "/etc/sddm.conf.d";
const SDDM_CONF: &str = "/etc/sddm.conf";
const GDM_CONFS: [&str; 2] = ["/etc/gdm3/custom.conf", "/etc/gdm/custom.conf"];

/// Passes when no display manager logs a user in without a password.
pub struct Autologin {
    host: Arc<dyn Host>,
    state: ProbeState,
}

impl Autologin {
    /// Probe over the given host
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self {
            host,
            state: ProbeState::default(),
        }
    }

    async fn file_has_line(&self, path: &Path, wanted: &str) -> bool {
        match self.host.read_to_string(path).await {
            Ok(body) => body
                .lines()
                .any(|line| line.trim().eq_ignore_ascii_case(wanted)),
            Err(_) => false,
        }
    }

    async fn finding(&self) -> Option<&'static str> {
        let mut sddm: Vec<_> = self
            .host
            .list_dir(Path::new(SDDM_DROP_INS))
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|p| p.extension().is_some_and(|ext| ext == "conf"))
            .collect();
        sddm.push(SDDM_CONF.into());
        for path in &sddm {
            if self.file_has_line(path, "Autologin=true").await {
                debug!(path = %path.display(), "SDDM autologin");
                return Some("Autologin=true in SDDM is enabled");
            }
        }

        for path in GDM_CONFS {
            if self
                .file_has_line(Path::new(path), "AutomaticLoginEnable=true")
                .await
            {
                debug!(path, "GDM autologin");
                return Some("AutomaticLoginEnable=true in GDM is enabled");
            }
        }

        if self.host.which("dconf").is_some() {
            let out = self
                .host
                .command("dconf", &["read", "/org/gnome/login-screen/enable-automatic-login"])
                .await;
            if out.is_ok_and(|o| o.trimmed() == "true") {
                return Some("Automatic login is enabled in GNOME");
            }
        }

        None
    }
}

#[async_trait]
impl Probe for Autologin {
    fn uuid(&self) -> &str {
        "f962c423-fdf5-428a-a57a-816abc9b253e"
    }

    fn name(&self) -> &str {
        "Automatic login is disabled"
    }

    fn passed_message(&self) -> &str {
        "Automatic login is off"
    }

    fn failed_message(&self) -> &str {
        "Automatic login is on"
    }

    async fn is_runnable(&self) -> bool {
        true
    }

    async fn run(&mut self) -> Result<()> {
        match self.finding().await {
            Some(reason) => self.state.fail(reason),
            None => self.state.pass(self.passed_message().to_string()),
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

    async fn run(host: FakeHost) -> Autologin {
        let mut probe = Autologin::new(Arc::new(host));
        probe.run().await.unwrap();
        probe
    }

    #[tokio::test]
    async fn clean_host_passes() {
        let probe = run(FakeHost::new().file(SDDM_CONF, "[Autologin]\nUser=\n")).await;
        assert!(probe.passed());
        assert_eq!(probe.status(), "Automatic login is off");
    }

    #[tokio::test]
    async fn sddm_drop_in_fails() {
        let host = FakeHost::new()
            .file("/etc/sddm.conf.d/kde_settings.conf", "[Autologin]\nAutologin=true\n")
            .file("/etc/sddm.conf.d/notes.txt", "Autologin=true");
        let probe = run(host).await;
        assert!(!probe.passed());
        assert_eq!(probe.status(), "Autologin=true in SDDM is enabled");
    }

    #[tokio::test]
    async fn gdm_setting_is_case_insensitive() {
        let host = FakeHost::new().file(
            "/etc/gdm3/custom.conf",
            "[daemon]\nAutomaticLoginEnable=True\nAutomaticLogin=alice\n",
        );
        let probe = run(host).await;
        assert!(!probe.passed());
        assert!(probe.status().contains("GDM"));
    }

    #[tokio::test]
    async fn gnome_dconf_key_fails() {
        let host = FakeHost::new().command(
            "dconf read /org/gnome/login-screen/enable-automatic-login",
            CommandOutput::ok("true\n"),
        );
        let probe = run(host).await;
        assert!(!probe.passed());
        assert_eq!(probe.status(), "Automatic login is enabled in GNOME");
    }
}
