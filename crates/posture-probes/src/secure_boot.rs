//! UEFI Secure Boot state.

use async_trait::async_trait;
use posture_core::{Probe, ProbeState, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::host::Host;

const EFIVARS: &str = "/sys/firmware/efi/efivars";

/// Passes when the firmware reports Secure Boot as enabled.
///
/// The EFI variable payload follows a 4-byte attribute header; byte 4 is the
/// Secure Boot flag.
pub struct SecureBoot {
    host: Arc<dyn Host>,
    state: ProbeState,
}

impl SecureBoot {
    /// Probe over the given host
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self {
            host,
            state: ProbeState::default(),
        }
    }
}

#[async_trait]
impl Probe for SecureBoot {
    fn uuid(&self) -> &str {
        "c96524f2-850b-4bb9-abc7-517051b6c14e"
    }

    fn name(&self) -> &str {
        "SecureBoot is enabled"
    }

    fn passed_message(&self) -> &str {
        "SecureBoot is enabled"
    }

    fn failed_message(&self) -> &str {
        "SecureBoot is disabled"
    }

    fn report_if_disabled(&self) -> bool {
        true
    }

    async fn is_runnable(&self) -> bool {
        self.host.exists(Path::new(EFIVARS)).await
    }

    async fn run(&mut self) -> Result<()> {
        let var = self
            .host
            .list_dir(Path::new(EFIVARS))
            .await
            .unwrap_or_default()
            .into_iter()
            .find(|p| {
                p.file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with("SecureBoot-"))
            });
        let Some(var) = var else {
            self.state.fail("Could not find SecureBoot EFI variable");
            return Ok(());
        };

        let Ok(data) = self.host.read_file(&var).await else {
            self.state.fail("Could not read SecureBoot status");
            return Ok(());
        };
        debug!(var = %var.display(), len = data.len(), "read SecureBoot variable");

        if data.get(4) == Some(&1) {
            self.state.pass(self.passed_message().to_string());
        } else {
            self.state.fail(self.failed_message().to_string());
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
