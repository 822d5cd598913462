//! Host firewall (ufw or firewalld).

use async_trait::async_trait;
use posture_core::{Probe, ProbeState, Result};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::host::Host;

/// Passes when ufw or firewalld is active. Reading ufw state needs root.
pub struct Firewall {
    host: Arc<dyn Host>,
    state: ProbeState,
}

impl Firewall {
    /// Probe over the given host
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self {
            host,
            state: ProbeState::default(),
        }
    }

    async fn ufw_active(&self) -> bool {
        if self.host.which("ufw").is_none() {
            return false;
        }
        match self.host.command("ufw", &["status"]).await {
            Ok(out) => {
                debug!(output = out.trimmed(), "ufw status");
                out.stdout.contains("Status: active")
            }
            Err(e) => {
                warn!(error = %e, "failed to check ufw status");
                false
            }
        }
    }

    async fn firewalld_active(&self) -> bool {
        match self
            .host
            .command("systemctl", &["is-active", "firewalld"])
            .await
        {
            Ok(out) => {
                debug!(output = out.trimmed(), "firewalld status");
                out.trimmed() == "active"
            }
            Err(e) => {
                warn!(error = %e, "failed to check firewalld status");
                false
            }
        }
    }
}

#[async_trait]
impl Probe for Firewall {
    fn uuid(&self) -> &str {
        "2e46c89a-5461-4865-a92e-3b799c12034a"
    }

    fn name(&self) -> &str {
        "Firewall is on"
    }

    fn passed_message(&self) -> &str {
        "Firewall is on"
    }

    fn failed_message(&self) -> &str {
        "Firewall is off"
    }

    fn requires_root(&self) -> bool {
        true
    }

    async fn is_runnable(&self) -> bool {
        self.host.which("ufw").is_some() || self.host.which("firewalld").is_some()
    }

    async fn run(&mut self) -> Result<()> {
        let passed = self.ufw_active().await || self.firewalld_active().await;
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
