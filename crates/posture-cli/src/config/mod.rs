//! Configuration management.

use anyhow::{Context as _, Result};
use directories::ProjectDirs;
use posture::{CheckStatus, HelperConfig, DEFAULT_SOCKET_PATH};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::output::OutputFormat;

/// Keys accepted by `posture config set`
pub const KEYS: [(&str, &str); 4] = [
    ("run_timeout_secs", "Deadline for a whole check run in seconds"),
    ("helper_socket", "Unix socket of the root helper"),
    ("helper_calls_per_second", "Maximum helper requests per second"),
    ("output_format", "Default output format (pretty/json/yaml)"),
];

/// CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Deadline for a whole check run.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,

    /// Socket of the root helper.
    pub helper_socket: Option<PathBuf>,

    /// Client-side rate limit for helper requests.
    #[serde(default = "default_calls_per_second")]
    pub helper_calls_per_second: u32,

    /// Default output format.
    pub output_format: Option<OutputFormat>,

    /// Last known status of every check, keyed by probe id.
    #[serde(default)]
    pub checks: BTreeMap<String, CheckStatus>,
}

const fn default_run_timeout() -> u64 {
    60
}

const fn default_calls_per_second() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            run_timeout_secs: default_run_timeout(),
            helper_socket: None,
            helper_calls_per_second: default_calls_per_second(),
            output_format: None,
            checks: BTreeMap::new(),
        }
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "posture", "posture")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

impl Config {
    /// Get the config file path.
    pub fn path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Location of the last-state file.
    pub fn state_path() -> Result<PathBuf> {
        Ok(project_dirs()?.cache_dir().join("last_state.toml"))
    }

    /// Load configuration from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Load configuration from `path`, defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Set one key from its string form.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "run_timeout_secs" | "timeout" => {
                let secs: u64 = value.parse().context("timeout must be a whole number of seconds")?;
                anyhow::ensure!(secs > 0, "timeout must be at least one second");
                self.run_timeout_secs = secs;
            }
            "helper_socket" | "socket" => {
                anyhow::ensure!(!value.is_empty(), "socket path must not be empty");
                self.helper_socket = Some(PathBuf::from(value));
            }
            "helper_calls_per_second" => {
                let rate: u32 = value.parse().context("rate must be a whole number")?;
                anyhow::ensure!(rate > 0, "rate must be at least one call per second");
                self.helper_calls_per_second = rate;
            }
            "output_format" | "output" => {
                self.output_format = Some(value.parse()?);
            }
            _ => {
                let available: String = KEYS
                    .iter()
                    .map(|(k, help)| format!("\n  {k:<24} - {help}"))
                    .collect();
                anyhow::bail!("Unknown config key: {key}\n\nAvailable keys:{available}");
            }
        }
        Ok(())
    }

    /// Run deadline.
    pub const fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    /// Helper socket, falling back to the system default.
    pub fn socket(&self) -> PathBuf {
        self.helper_socket
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH))
    }

    /// Client settings for the root helper.
    pub fn helper(&self) -> HelperConfig {
        HelperConfig::new()
            .socket_path(self.socket())
            .calls_per_second(self.helper_calls_per_second)
    }
}
