//! Check registry: the catalogue of probes grouped into claims, and the
//! ledger of last-observed status per probe id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::error::{PostureError, Result};
use crate::probe::{ProbeHandle, ProbeMeta};

/// Schema export: claim title -> probe id -> `[passed message, failed message]`
pub type Schema = BTreeMap<String, BTreeMap<String, [String; 2]>>;

/// A named, ordered group of probes.
#[derive(Debug, Clone)]
pub struct Claim {
    title: String,
    probes: Vec<ProbeHandle>,
}

impl Claim {
    /// Claim title
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Probes in registration order
    #[must_use]
    pub fn probes(&self) -> &[ProbeHandle] {
        &self.probes
    }
}

/// Last-observed status of one probe, as kept in the user config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckStatus {
    /// When this entry was last written
    pub updated_at: DateTime<Utc>,
    /// Last outcome
    pub passed: bool,
    /// Whether the probe was not runnable
    pub disabled: bool,
}

/// Probe id -> last-observed status, shared across every unit of work.
#[derive(Debug, Default)]
pub struct CheckLedger {
    entries: Mutex<BTreeMap<String, CheckStatus>>,
}

impl CheckLedger {
    /// Empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger seeded from a persisted snapshot
    #[must_use]
    pub fn from_snapshot(entries: BTreeMap<String, CheckStatus>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, CheckStatus>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a first-seen entry for `uuid`; a no-op if one already exists.
    ///
    /// Returns true when an entry was created.
    pub fn register(&self, uuid: &str) -> bool {
        let mut entries = self.entries();
        if entries.contains_key(uuid) {
            return false;
        }
        entries.insert(
            uuid.to_string(),
            CheckStatus {
                updated_at: Utc::now(),
                passed: false,
                disabled: false,
            },
        );
        true
    }

    /// Overwrite the live fields after an execution or a skip
    pub fn record(&self, uuid: &str, passed: bool, disabled: bool) {
        self.entries().insert(
            uuid.to_string(),
            CheckStatus {
                updated_at: Utc::now(),
                passed,
                disabled,
            },
        );
    }

    /// Status for one probe
    #[must_use]
    pub fn get(&self, uuid: &str) -> Option<CheckStatus> {
        self.entries().get(uuid).cloned()
    }

    /// Copy of every entry, for persisting
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, CheckStatus> {
        self.entries().clone()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether the ledger has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// The probe catalogue.
///
/// Built once at process start and passed by reference to whatever needs to
/// find a probe by id.
#[derive(Debug, Default)]
pub struct Registry {
    claims: Vec<Claim>,
    index: HashMap<String, (ProbeHandle, usize)>,
    ledger: Arc<CheckLedger>,
}

impl Registry {
    /// Empty registry with a fresh ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty registry that records into an existing ledger
    #[must_use]
    pub fn with_ledger(ledger: CheckLedger) -> Self {
        Self {
            ledger: Arc::new(ledger),
            ..Self::default()
        }
    }

    /// Add a probe to the claim with the given title.
    ///
    /// Registering the same instance again under the same claim is a no-op.
    /// A different instance with an id that is already taken, or the same
    /// instance under another claim, is an integrity error.
    pub fn register(&mut self, claim_title: &str, handle: ProbeHandle) -> Result<()> {
        if handle.uuid().is_empty() {
            return Err(PostureError::Probe(format!(
                "probe \"{}\" has an empty id",
                handle.meta().name
            )));
        }

        if let Some((existing, claim_idx)) = self.index.get(handle.uuid()) {
            if !existing.same_instance(&handle) {
                return Err(PostureError::DuplicateProbe {
                    uuid: handle.uuid().to_string(),
                    existing: existing.meta().name.clone(),
                });
            }
            let claim = &self.claims[*claim_idx];
            if claim.title != claim_title {
                return Err(PostureError::ProbeInMultipleClaims {
                    uuid: handle.uuid().to_string(),
                    claim: claim.title.clone(),
                });
            }
            debug!(uuid = %handle.uuid(), "probe already registered");
            return Ok(());
        }

        let claim_idx = match self.claims.iter().position(|c| c.title == claim_title) {
            Some(idx) => idx,
            None => {
                self.claims.push(Claim {
                    title: claim_title.to_string(),
                    probes: Vec::new(),
                });
                self.claims.len() - 1
            }
        };

        self.ledger.register(handle.uuid());
        self.claims[claim_idx].probes.push(handle.clone());
        self.index
            .insert(handle.uuid().to_string(), (handle, claim_idx));
        Ok(())
    }

    /// Claims in first-registration order
    #[must_use]
    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    /// Look up a probe by id
    #[must_use]
    pub fn get(&self, uuid: &str) -> Option<&ProbeHandle> {
        self.index.get(uuid).map(|(handle, _)| handle)
    }

    /// Title of the claim a probe belongs to
    #[must_use]
    pub fn claim_of(&self, uuid: &str) -> Option<&str> {
        self.index
            .get(uuid)
            .map(|(_, idx)| self.claims[*idx].title.as_str())
    }

    /// Every probe with the title of its claim, in catalogue order
    pub fn probes(&self) -> impl Iterator<Item = (&str, &ProbeHandle)> {
        self.claims
            .iter()
            .flat_map(|c| c.probes.iter().map(move |p| (c.title.as_str(), p)))
    }

    /// Static facts of every probe, in catalogue order
    pub fn metas(&self) -> impl Iterator<Item = &ProbeMeta> {
        self.probes().map(|(_, p)| p.meta())
    }

    /// Number of registered probes
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// The ledger of last-observed status
    #[must_use]
    pub fn ledger(&self) -> &Arc<CheckLedger> {
        &self.ledger
    }

    /// Every probe's id and static messages, grouped by claim, without running anything
    #[must_use]
    pub fn schema(&self) -> Schema {
        self.claims
            .iter()
            .map(|claim| {
                let probes = claim
                    .probes
                    .iter()
                    .map(|p| {
                        let meta = p.meta();
                        (
                            meta.uuid.clone(),
                            [meta.passed_message.clone(), meta.failed_message.clone()],
                        )
                    })
                    .collect();
                (claim.title.clone(), probes)
            })
            .collect()
    }
}
