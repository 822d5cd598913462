//! Runs every registered probe concurrently under one deadline.

use futures_util::FutureExt;
use posture_core::{
    CheckLedger, Delegator, FsStateFile, LastState, LastStateStore, PostureError, ProbeHandle,
    ProbeOutcome, Registry, Result, StateFile, Verdict,
};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Default deadline for a whole run
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Live progress of a run, one event per state change of a probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// The probe's unit of work began
    Started {
        /// Probe id
        uuid: String,
        /// Probe label
        name: String,
    },
    /// The probe ran and the property holds
    Passed {
        /// Probe id
        uuid: String,
        /// Detail text
        detail: String,
    },
    /// The probe ran and the property is absent
    Failed {
        /// Probe id
        uuid: String,
        /// Detail text
        detail: String,
    },
    /// The probe cannot run on this host
    Skipped {
        /// Probe id
        uuid: String,
    },
    /// The probe mechanism failed
    Errored {
        /// Probe id
        uuid: String,
        /// Error message
        error: String,
    },
}

impl RunEvent {
    /// Id of the probe this event is about
    #[must_use]
    pub fn uuid(&self) -> &str {
        match self {
            Self::Started { uuid, .. }
            | Self::Passed { uuid, .. }
            | Self::Failed { uuid, .. }
            | Self::Skipped { uuid }
            | Self::Errored { uuid, .. } => uuid,
        }
    }
}

/// What one pass over the catalogue decided.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Verdict per probe id
    pub verdicts: BTreeMap<String, Verdict>,
    /// Wall-clock time of the run
    pub elapsed: Duration,
}

impl RunReport {
    /// Machine-readable summary: probe id to `"passed"`, `"failed"`, `"skipped"` or the error
    #[must_use]
    pub fn summary(&self) -> BTreeMap<String, String> {
        self.verdicts
            .iter()
            .map(|(uuid, verdict)| (uuid.clone(), verdict.to_string()))
            .collect()
    }

    /// Verdict for one probe
    #[must_use]
    pub fn verdict(&self, uuid: &str) -> Option<&Verdict> {
        self.verdicts.get(uuid)
    }

    /// Number of probes that failed or errored
    #[must_use]
    pub fn failures(&self) -> usize {
        self.verdicts
            .values()
            .filter(|v| matches!(v, Verdict::Failed | Verdict::Errored(_)))
            .count()
    }
}

/// Shared context of one run, cloned into every unit of work.
struct Shared<F: StateFile> {
    store: Arc<LastStateStore<F>>,
    ledger: Arc<CheckLedger>,
    delegator: Option<Arc<dyn Delegator>>,
    elevated: bool,
    deadline: Instant,
    events: Option<UnboundedSender<RunEvent>>,
}

impl<F: StateFile> Shared<F> {
    fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

/// Concurrent executor for every probe in a [`Registry`].
pub struct Scheduler<'a, F: StateFile = FsStateFile> {
    registry: &'a Registry,
    store: Arc<LastStateStore<F>>,
    timeout: Duration,
    delegator: Option<Arc<dyn Delegator>>,
    elevated: bool,
    events: Option<UnboundedSender<RunEvent>>,
}

impl<'a, F: StateFile + 'static> Scheduler<'a, F> {
    /// Create a builder for a run over `registry` that records into `store`
    #[must_use]
    pub fn builder(registry: &'a Registry, store: Arc<LastStateStore<F>>) -> SchedulerBuilder<'a, F> {
        SchedulerBuilder::new(registry, store)
    }

    /// Run every probe once.
    ///
    /// Probe failures never abort the run; they become [`Verdict::Errored`].
    /// The last-state store is committed once at the end, also when the
    /// deadline is hit, in which case [`PostureError::RunTimedOut`] is returned.
    #[instrument(skip(self), fields(probes = self.registry.len(), timeout = ?self.timeout))]
    pub async fn run(&self) -> Result<RunReport> {
        let started = Instant::now();
        let shared = Arc::new(Shared {
            store: Arc::clone(&self.store),
            ledger: Arc::clone(self.registry.ledger()),
            delegator: self.delegator.clone(),
            elevated: self.elevated,
            deadline: started + self.timeout,
            events: self.events.clone(),
        });

        let mut set = JoinSet::new();
        for (_, handle) in self.registry.probes() {
            let handle = handle.clone();
            let shared = Arc::clone(&shared);
            set.spawn(async move {
                let uuid = handle.uuid().to_string();
                let verdict = AssertUnwindSafe(execute(&handle, &shared))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        warn!(uuid = %uuid, "probe panicked");
                        let msg = "probe panicked".to_string();
                        shared.emit(RunEvent::Errored {
                            uuid: uuid.clone(),
                            error: msg.clone(),
                        });
                        Some(Verdict::Errored(msg))
                    });
                (uuid, verdict)
            });
        }

        let mut report = RunReport::default();
        let mut abandoned = 0usize;
        let collected = tokio::time::timeout_at(shared.deadline, async {
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((uuid, Some(verdict))) => {
                        report.verdicts.insert(uuid, verdict);
                    }
                    Ok((uuid, None)) => {
                        debug!(uuid = %uuid, "abandoned after deadline");
                        abandoned += 1;
                    }
                    Err(e) => warn!(error = %e, "probe task failed"),
                }
            }
        })
        .await;

        // Units that never started count as outstanding even if the join
        // loop drained them before the timer fired.
        let outstanding = set.len() + abandoned;
        let timed_out = collected.is_err() || abandoned > 0;
        if collected.is_err() {
            warn!(outstanding, "deadline reached, aborting outstanding probes");
            set.shutdown().await;
        }

        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || store.commit()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "failed to persist last state"),
            Err(e) => warn!(error = %e, "last state commit task failed"),
        }

        report.elapsed = started.elapsed();
        if timed_out {
            return Err(PostureError::RunTimedOut {
                timeout: self.timeout,
                outstanding,
            });
        }

        info!(
            probes = report.verdicts.len(),
            failures = report.failures(),
            elapsed = ?report.elapsed,
            "run complete"
        );
        Ok(report)
    }
}

/// One probe's unit of work. `None` means it was abandoned before starting.
async fn execute<F: StateFile>(handle: &ProbeHandle, shared: &Shared<F>) -> Option<Verdict> {
    let meta = handle.meta();
    let uuid = meta.uuid.as_str();

    if Instant::now() >= shared.deadline {
        return None;
    }
    shared.emit(RunEvent::Started {
        uuid: uuid.to_string(),
        name: meta.name.clone(),
    });

    let mut probe = handle.lock().await;
    if !probe.is_runnable().await {
        debug!(uuid, "not runnable, skipping");
        shared.ledger.record(uuid, false, true);
        shared.emit(RunEvent::Skipped {
            uuid: uuid.to_string(),
        });
        return Some(Verdict::Skipped);
    }

    let outcome = if meta.requires_root && !shared.elevated {
        match &shared.delegator {
            Some(delegator) => delegator.delegate(uuid).await.map(|passed| ProbeOutcome {
                passed,
                detail: meta.message_for(passed).to_string(),
            }),
            None => Err(PostureError::HelperUnavailable {
                socket: PathBuf::from(posture_privilege::DEFAULT_SOCKET_PATH),
                reason: "no helper client configured".into(),
            }),
        }
    } else {
        probe.run().await.map(|()| ProbeOutcome {
            passed: probe.passed(),
            detail: probe.status(),
        })
    };
    drop(probe);

    match outcome {
        Ok(outcome) => {
            debug!(uuid, passed = outcome.passed, "probe finished");
            shared
                .store
                .update(LastState::new(uuid, outcome.passed, outcome.detail.clone()));
            shared.ledger.record(uuid, outcome.passed, false);
            let event = if outcome.passed {
                RunEvent::Passed {
                    uuid: uuid.to_string(),
                    detail: outcome.detail,
                }
            } else {
                RunEvent::Failed {
                    uuid: uuid.to_string(),
                    detail: outcome.detail,
                }
            };
            shared.emit(event);
            Some(Verdict::from_passed(outcome.passed))
        }
        Err(e) => {
            warn!(uuid, error = %e, "probe could not run");
            let msg = e.to_string();
            shared.store.update(LastState::new(uuid, false, msg.clone()));
            shared.ledger.record(uuid, false, false);
            shared.emit(RunEvent::Errored {
                uuid: uuid.to_string(),
                error: msg.clone(),
            });
            Some(Verdict::Errored(msg))
        }
    }
}

/// Builder for a [`Scheduler`]
pub struct SchedulerBuilder<'a, F: StateFile = FsStateFile> {
    registry: &'a Registry,
    store: Arc<LastStateStore<F>>,
    timeout: Duration,
    delegator: Option<Arc<dyn Delegator>>,
    elevated: Option<bool>,
    events: Option<UnboundedSender<RunEvent>>,
}

impl<'a, F: StateFile + 'static> SchedulerBuilder<'a, F> {
    /// Create a builder with default settings
    #[must_use]
    pub fn new(registry: &'a Registry, store: Arc<LastStateStore<F>>) -> Self {
        Self {
            registry,
            store,
            timeout: DEFAULT_TIMEOUT,
            delegator: None,
            elevated: None,
            events: None,
        }
    }

    /// Set the deadline for the whole run
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set who runs root-only probes when this process is not root
    #[must_use]
    pub fn delegator(mut self, delegator: Arc<dyn Delegator>) -> Self {
        self.delegator = Some(delegator);
        self
    }

    /// Override root detection
    #[must_use]
    pub const fn elevated(mut self, elevated: bool) -> Self {
        self.elevated = Some(elevated);
        self
    }

    /// Send live [`RunEvent`]s to this channel
    #[must_use]
    pub fn events(mut self, tx: UnboundedSender<RunEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Build the scheduler
    #[must_use]
    pub fn build(self) -> Scheduler<'a, F> {
        Scheduler {
            registry: self.registry,
            store: self.store,
            timeout: self.timeout,
            delegator: self.delegator,
            elevated: self.elevated.unwrap_or_else(posture_privilege::is_elevated),
            events: self.events,
        }
    }
}
