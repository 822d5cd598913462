//! # posture-runner
//!
//! Runs a [`posture_core::Registry`] concurrently under a global deadline and
//! turns the verdicts into an aggregate [`PostureReport`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use posture_runner::{PostureReport, Scheduler};
//!
//! let report = Scheduler::builder(&registry, store)
//!     .timeout(Duration::from_secs(30))
//!     .delegator(Arc::new(HelperClient::new()))
//!     .build()
//!     .run()
//!     .await?;
//!
//! println!("{}", serde_json::to_string(&report.summary())?);
//! let posture = PostureReport::build(&registry, &report);
//! ```

mod report;
mod scheduler;

pub use report::{node_id, PostureReport, ReportState};
pub use scheduler::{RunEvent, RunReport, Scheduler, SchedulerBuilder, DEFAULT_TIMEOUT};
