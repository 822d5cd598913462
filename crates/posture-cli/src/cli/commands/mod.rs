//! Command implementations.

pub mod check;
pub mod config;
pub mod helper;
pub mod status;

use anyhow::Result;
use posture::{register_defaults, CheckLedger, Host, LastStateStore, Registry, SystemHost};
use std::sync::Arc;

use crate::config::Config;
use crate::output::OutputFormat;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Loaded configuration
    pub config: Config,

    /// Output format
    pub output_format: OutputFormat,

    /// Verbose output
    pub verbose: bool,

    /// Disable colors
    pub no_color: bool,
}

impl Context {
    /// Build the default catalogue against the real host, seeding the
    /// ledger with the statuses remembered in the config.
    pub fn registry(&self) -> Result<Registry> {
        let host: Arc<dyn Host> = Arc::new(SystemHost::new());
        let ledger = CheckLedger::from_snapshot(self.config.checks.clone());
        let mut registry = Registry::with_ledger(ledger);
        register_defaults(&mut registry, &host)?;
        Ok(registry)
    }

    /// Open the per-user last-state store.
    pub fn store(&self) -> Result<Arc<LastStateStore>> {
        Ok(Arc::new(LastStateStore::open(Config::state_path()?)))
    }
}
