//! Remote-access and file-sharing services reachable from the network.

use async_trait::async_trait;
use posture_core::{Probe, ProbeState, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::host::Host;
use crate::ports::{describe, listening_services, ServicePort};

const REMOTE_ACCESS: &[ServicePort] = &[
    ServicePort::new(22, "SSH"),
    ServicePort::new(3389, "RDP"),
    ServicePort::new(3390, "RDP"),
    ServicePort::new(5900, "VNC"),
];

const FILE_SHARING: &[ServicePort] = &[
    ServicePort::new(111, "RPC"),
    ServicePort::new(139, "NetBIOS"),
    ServicePort::new(445, "SMB"),
    ServicePort::new(2049, "NFS"),
    ServicePort::new(8200, "DLNA"),
];

/// Passes when no remote login service answers on a non-loopback address.
pub struct RemoteLogin {
    host: Arc<dyn Host>,
    timeout: Duration,
    state: ProbeState,
}

impl RemoteLogin {
    /// Probe over the given host
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self {
            host,
            timeout: Duration::from_secs(1),
            state: ProbeState::default(),
        }
    }

    /// Set the per-dial timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Probe for RemoteLogin {
    fn uuid(&self) -> &str {
        "4ced961d-7cfc-4e7b-8f80-195f6379446e"
    }

    fn name(&self) -> &str {
        "Remote login is disabled"
    }

    fn passed_message(&self) -> &str {
        "No remote access services found running"
    }

    fn failed_message(&self) -> &str {
        "Remote access services found running"
    }

    async fn is_runnable(&self) -> bool {
        true
    }

    async fn run(&mut self) -> Result<()> {
        let open = listening_services(self.host.as_ref(), REMOTE_ACCESS, self.timeout).await?;
        if open.is_empty() {
            self.state.pass(self.passed_message().to_string());
        } else {
            self.state.fail(format!(
                "Remote access services found running on ports: {}",
                describe(&open)
            ));
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

/// Passes when no file-sharing service answers on a non-loopback address.
pub struct FileSharing {
    host: Arc<dyn Host>,
    timeout: Duration,
    state: ProbeState,
}

impl FileSharing {
    /// Probe over the given host
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self {
            host,
            timeout: Duration::from_millis(500),
            state: ProbeState::default(),
        }
    }

    /// Set the per-dial timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Probe for FileSharing {
    fn uuid(&self) -> &str {
        "b96524e0-850b-4bb8-abc7-517051b6c14e"
    }

    fn name(&self) -> &str {
        "File Sharing is disabled"
    }

    fn passed_message(&self) -> &str {
        "No file sharing services found running"
    }

    fn failed_message(&self) -> &str {
        "Sharing services found running"
    }

    async fn is_runnable(&self) -> bool {
        true
    }

    async fn run(&mut self) -> Result<()> {
        let open = listening_services(self.host.as_ref(), FILE_SHARING, self.timeout).await?;
        if open.is_empty() {
            self.state.pass(self.passed_message().to_string());
        } else {
            self.state.fail(format!(
                "Sharing services found running on ports: {}",
                describe(&open)
            ));
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
