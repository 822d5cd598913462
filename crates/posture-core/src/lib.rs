//! Core types and traits for the posture auditor.
//!
//! This crate provides the pieces every other posture crate builds on:
//!
//! - **Probe**: the [`Probe`] contract and the shared [`ProbeHandle`]
//! - **Registry**: claims, the probe catalogue and the [`CheckLedger`]
//! - **State**: the mtime-gated [`LastStateStore`]
//! - **Errors**: one error type, [`PostureError`]
//!
//! # Example
//!
//! ```rust,ignore
//! use posture_core::{LastStateStore, Registry, Result};
//!
//! fn show(registry: &Registry, store: &LastStateStore) -> Result<()> {
//!     for (claim, probe) in registry.probes() {
//!         let last = store.get(probe.uuid())?;
//!         println!("{claim}: {} {:?}", probe.meta().name, last.map(|s| s.state));
//!     }
//!     Ok(())
//! }
//! ```

mod error;
pub mod probe;
pub mod registry;
pub mod state;
pub mod types;

pub use error::{PostureError, Result};
pub use probe::{Delegator, Probe, ProbeHandle, ProbeMeta};
pub use registry::{CheckLedger, CheckStatus, Claim, Registry, Schema};
pub use state::{FsStateFile, LastState, LastStateStore, StateFile};
pub use types::*;
