//! Local security posture auditor for Linux hosts.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use posture::{default_registry, HelperClient, LastStateStore, Scheduler, SystemHost};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> posture::Result<()> {
//!     let registry = default_registry(Arc::new(SystemHost::new()))?;
//!     let store = Arc::new(LastStateStore::open("/var/cache/posture/last_state.toml"));
//!
//!     let report = Scheduler::builder(&registry, store)
//!         .delegator(Arc::new(HelperClient::new()))
//!         .build()
//!         .run()
//!         .await?;
//!
//!     for (uuid, verdict) in report.summary() {
//!         println!("{uuid}: {verdict}");
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Crates
//!
//! - `posture-core` - probe contract, registry and last-state store
//! - `posture-probes` - the built-in Linux probes
//! - `posture-privilege` - root helper client, server and wire protocol
//! - `posture-runner` - concurrent scheduler and posture report

// Re-export core types
pub use posture_core::*;

pub use posture_privilege::{
    bind, inherited_listener, is_elevated, protocol, Helper, HelperClient, HelperConfig, HelperDecision,
    DEFAULT_SOCKET_PATH,
};
pub use posture_probes as probes;
pub use posture_probes::{default_registry, register_defaults, Host, SystemHost};
pub use posture_runner::{
    node_id, PostureReport, ReportState, RunEvent, RunReport, Scheduler, SchedulerBuilder,
};

// Re-export runtime for convenience
pub use serde;
pub use serde_json;
pub use tokio;
