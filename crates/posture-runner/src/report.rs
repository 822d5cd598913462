//! Aggregate posture report with a change fingerprint.
//!
//! The fingerprint only moves when the set of failing or disabled probes
//! changes, so consumers can tell a real posture change from a re-run.

use chrono::{DateTime, Utc};
use posture_core::{Registry, Verdict};
use ring::digest::{digest, SHA256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::scheduler::RunReport;

/// Per-probe state in a [`PostureReport`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportState {
    /// Ran and passed
    Pass,
    /// Ran and failed, or could not execute
    Fail,
    /// Not runnable on this host and flagged to be reported anyway
    Off,
}

/// Counts, per-probe states and the change fingerprint of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostureReport {
    /// Node the report describes
    pub node_id: String,
    /// Probes that passed
    pub passed_count: usize,
    /// Probes that failed or errored
    pub failed_count: usize,
    /// Probes that were skipped but report when disabled
    pub disabled_count: usize,
    /// State per probe id
    pub state: BTreeMap<String, ReportState>,
    /// SHA-256 over the disabled and failed probe ids
    pub significant_change: String,
    /// When the report was built
    pub last_check: DateTime<Utc>,
}

impl PostureReport {
    /// Build a report for this node
    #[must_use]
    pub fn build(registry: &Registry, run: &RunReport) -> Self {
        Self::build_for(&node_id(), registry, run)
    }

    /// Build a report for an explicit node id.
    ///
    /// Probes are visited in claim order. Skipped probes without
    /// `report_if_disabled` and probes abandoned at the deadline are omitted.
    #[must_use]
    pub fn build_for(node_id: &str, registry: &Registry, run: &RunReport) -> Self {
        let mut report = Self {
            node_id: node_id.to_string(),
            passed_count: 0,
            failed_count: 0,
            disabled_count: 0,
            state: BTreeMap::new(),
            significant_change: String::new(),
            last_check: Utc::now(),
        };
        let mut disabled_seed = node_id.to_string();
        let mut failed_seed = node_id.to_string();

        for meta in registry.metas() {
            let state = match run.verdict(&meta.uuid) {
                Some(Verdict::Passed) => {
                    report.passed_count += 1;
                    ReportState::Pass
                }
                Some(Verdict::Failed | Verdict::Errored(_)) => {
                    report.failed_count += 1;
                    failed_seed.push_str(&meta.uuid);
                    ReportState::Fail
                }
                Some(Verdict::Skipped) if meta.report_if_disabled => {
                    report.disabled_count += 1;
                    disabled_seed.push_str(&meta.uuid);
                    ReportState::Off
                }
                Some(Verdict::Skipped) | None => continue,
            };
            report.state.insert(meta.uuid.clone(), state);
        }

        report.significant_change = fingerprint(&disabled_seed, &failed_seed);
        report
    }
}

fn fingerprint(disabled_seed: &str, failed_seed: &str) -> String {
    let seed = format!("{disabled_seed}.{failed_seed}");
    hex::encode(digest(&SHA256, seed.as_bytes()).as_ref())
}

/// Stable identifier of this machine.
///
/// Tries `/etc/machine-id` first, then the hostname.
pub fn node_id() -> String {
    if let Ok(id) = std::fs::read_to_string("/etc/machine-id") {
        let trimmed = id.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    hostname::get().map_or_else(
        |_| "unknown".to_string(),
        |h| h.to_string_lossy().into_owned(),
    )
}
