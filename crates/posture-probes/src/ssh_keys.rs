//! Strength of the user's SSH key pairs.

use async_trait::async_trait;
use posture_core::{Probe, ProbeState, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ProbeError;
use crate::host::Host;

/// Key algorithm as printed by `ssh-keygen -l`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// RSA
    Rsa,
    /// DSA
    Dsa,
    /// ECDSA, including security-key backed
    Ecdsa,
    /// Ed25519, including security-key backed
    Ed25519,
}

impl KeyKind {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim_matches(|c| c == '(' || c == ')').to_ascii_uppercase();
        match raw.as_str() {
            "RSA" => Some(Self::Rsa),
            "DSA" => Some(Self::Dsa),
            "ECDSA" | "ECDSA-SK" => Some(Self::Ecdsa),
            "ED25519" | "ED25519-SK" => Some(Self::Ed25519),
            _ => None,
        }
    }

    /// Smallest acceptable key size in bits
    #[must_use]
    pub const fn min_bits(self) -> u32 {
        match self {
            Self::Rsa => 2048,
            Self::Dsa => 8192,
            Self::Ecdsa => 521,
            Self::Ed25519 => 256,
        }
    }
}

/// Size and algorithm of one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInfo {
    /// Size in bits
    pub bits: u32,
    /// Algorithm
    pub kind: KeyKind,
}

impl KeyInfo {
    /// Parse `3072 SHA256:abc user@host (RSA)`
    pub fn parse(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            return None;
        }
        Some(Self {
            bits: fields[0].parse().ok()?,
            kind: KeyKind::parse(fields[fields.len() - 1])?,
        })
    }

    /// Whether the key meets the minimum size for its algorithm
    #[must_use]
    pub const fn is_strong(&self) -> bool {
        self.bits >= self.kind.min_bits()
    }
}

/// Passes when every SSH key pair in `~/.ssh` uses a strong algorithm and size.
pub struct SshKeyStrength {
    host: Arc<dyn Host>,
    state: ProbeState,
}

impl SshKeyStrength {
    /// Probe over the given host
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self {
            host,
            state: ProbeState::default(),
        }
    }

    /// Public keys in `dir` that have a private key next to them
    async fn key_pairs(&self, dir: &Path) -> std::result::Result<Vec<PathBuf>, ProbeError> {
        let mut pairs = Vec::new();
        for path in self.host.list_dir(dir).await? {
            if path.extension().is_some_and(|ext| ext == "pub")
                && self.host.exists(&path.with_extension("")).await
            {
                pairs.push(path);
            }
        }
        Ok(pairs)
    }

    async fn is_strong(&self, public: &Path) -> bool {
        let path = public.to_string_lossy();
        match self.host.command("ssh-keygen", &["-l", "-f", &path]).await {
            Ok(out) if out.success() => {
                let info = KeyInfo::parse(out.trimmed());
                debug!(key = %path, ?info, "inspected key");
                info.is_some_and(|k| k.is_strong())
            }
            Ok(out) => {
                warn!(key = %path, stderr = out.stderr.trim(), "ssh-keygen rejected key");
                false
            }
            Err(e) => {
                warn!(key = %path, error = %e, "could not inspect key");
                false
            }
        }
    }

    fn ssh_dir(&self) -> Option<PathBuf> {
        self.host.home_dir().map(|home| home.join(".ssh"))
    }
}

#[async_trait]
impl Probe for SshKeyStrength {
    fn uuid(&self) -> &str {
        "ef69f752-0e89-46e2-a644-310429ae5f45"
    }

    fn name(&self) -> &str {
        "SSH keys have sufficient algorithm strength"
    }

    fn passed_message(&self) -> &str {
        "SSH keys use strong encryption"
    }

    fn failed_message(&self) -> &str {
        "SSH keys are using weak encryption"
    }

    async fn is_runnable(&self) -> bool {
        let Some(dir) = self.ssh_dir() else {
            return false;
        };
        self.key_pairs(&dir)
            .await
            .is_ok_and(|pairs| !pairs.is_empty())
    }

    async fn run(&mut self) -> Result<()> {
        let dir = self
            .ssh_dir()
            .ok_or_else(|| ProbeError::Missing("home directory".into()))?;

        for public in self.key_pairs(&dir).await? {
            if !self.is_strong(&public).await {
                let name = public
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.state
                    .fail(format!("SSH key {name} is using weak encryption"));
                return Ok(());
            }
        }

        self.state.pass(self.passed_message().to_string());
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

    #[test]
    fn parses_keygen_fingerprint_lines() {
        let rsa = KeyInfo::parse("3072 SHA256:nThbg6kXUpJWGl7E1IGOCspRomTxdCARLviKw6E5SY8 alice@box (RSA)").unwrap();
        assert_eq!(rsa, KeyInfo { bits: 3072, kind: KeyKind::Rsa });
        assert!(rsa.is_strong());

        let sk = KeyInfo::parse("256 SHA256:abc alice@box (ED25519-SK)").unwrap();
        assert_eq!(sk.kind, KeyKind::Ed25519);
        assert!(sk.is_strong());

        assert!(!KeyInfo::parse("1024 SHA256:abc old (RSA)").unwrap().is_strong());
        assert!(!KeyInfo::parse("256 SHA256:abc ec (ECDSA)").unwrap().is_strong());
        assert!(KeyInfo::parse("garbage").is_none());
        assert!(KeyInfo::parse("256 SHA256:abc x (XMSS)").is_none());
    }

    fn home_with_keys() -> FakeHost {
        FakeHost::new()
            .home("/home/alice")
            .file("/home/alice/.ssh/id_ed25519", "private")
            .file("/home/alice/.ssh/id_ed25519.pub", "public")
            .file("/home/alice/.ssh/orphan.pub", "public")
            .file("/home/alice/.ssh/known_hosts", "")
            .command(
                "ssh-keygen -l -f /home/alice/.ssh/id_ed25519.pub",
                CommandOutput::ok("256 SHA256:abc alice@box (ED25519)\n"),
            )
    }

    #[tokio::test]
    async fn strong_pairs_pass_and_orphans_are_ignored() {
        let mut probe = SshKeyStrength::new(Arc::new(home_with_keys()));
        assert!(probe.is_runnable().await);
        probe.run().await.unwrap();
        assert!(probe.passed());
        assert_eq!(probe.status(), "SSH keys use strong encryption");
    }

    #[tokio::test]
    async fn weak_pair_names_the_key() {
        let host = home_with_keys()
            .file("/home/alice/.ssh/id_rsa", "private")
            .file("/home/alice/.ssh/id_rsa.pub", "public")
            .command(
                "ssh-keygen -l -f /home/alice/.ssh/id_rsa.pub",
                CommandOutput::ok("1024 SHA256:def alice@box (RSA)\n"),
            );
        let mut probe = SshKeyStrength::new(Arc::new(host));
        probe.run().await.unwrap();
        assert!(!probe.passed());
        assert_eq!(probe.status(), "SSH key id_rsa is using weak encryption");
    }

    #[tokio::test]
    async fn not_runnable_without_key_pairs() {
        let host = FakeHost::new()
            .home("/home/bob")
            .file("/home/bob/.ssh/only.pub", "public");
        let probe = SshKeyStrength::new(Arc::new(host));
        assert!(!probe.is_runnable().await);
        assert!(!SshKeyStrength::new(Arc::new(FakeHost::new())).is_runnable().await);
    }

    #[tokio::test]
    async fn missing_home_is_an_error() {
        let mut probe = SshKeyStrength::new(Arc::new(FakeHost::new()));
        assert!(probe.run().await.is_err());
    }
}
