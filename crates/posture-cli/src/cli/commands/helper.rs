//! `posture helper` - Privileged one-shot delegation helper.

use anyhow::{Context as _, Result};
use posture::{bind, default_registry, inherited_listener, is_elevated, Helper, SystemHost};
use std::sync::Arc;
use tracing::{info, warn};

use super::Context;
use crate::cli::args::HelperArgs;

pub async fn execute(_ctx: Context, args: HelperArgs) -> Result<()> {
    if !is_elevated() {
        warn!("helper is not running as root; privileged checks will report failures");
    }

    let listener = match &args.socket {
        Some(path) => bind(path).with_context(|| format!("failed to bind {}", path.display()))?,
        None => inherited_listener().context("no listening socket inherited on stdin")?,
    };

    let registry = default_registry(Arc::new(SystemHost::new()))?;
    info!(probes = registry.len(), "helper ready");
    Helper::new(&registry).serve_one(&listener).await?;

    Ok(())
}
