//! The uniform contract every security check implements.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::Result;

/// One security property probed on the local host.
///
/// `run` mutates the probe's own outcome and detail; `passed` and `status`
/// read them back. An `Err` from `run` means the underlying mechanism could
/// not execute, a negative finding is `Ok(())` with `passed() == false`.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Stable id, unique across the catalogue
    fn uuid(&self) -> &str;

    /// Short human-readable label
    fn name(&self) -> &str;

    /// Message shown when the property holds
    fn passed_message(&self) -> &str;

    /// Message shown when the property is absent
    fn failed_message(&self) -> &str;

    /// Whether the probe needs root to run
    fn requires_root(&self) -> bool {
        false
    }

    /// Whether a skipped run still counts toward the significant-change signal
    fn report_if_disabled(&self) -> bool {
        false
    }

    /// Whether the tools or paths the probe needs exist on this host
    async fn is_runnable(&self) -> bool;

    /// Execute the check
    async fn run(&mut self) -> Result<()>;

    /// Last outcome, `false` before the first run
    fn passed(&self) -> bool;

    /// Detail text derived from the last outcome
    fn status(&self) -> String;
}

/// Static facts about a probe, read once when its handle is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeMeta {
    /// Probe id
    pub uuid: String,
    /// Probe label
    pub name: String,
    /// Passed-family message
    pub passed_message: String,
    /// Failed-family message
    pub failed_message: String,
    /// Needs elevated rights
    pub requires_root: bool,
    /// Counts toward the significant-change signal when skipped
    pub report_if_disabled: bool,
}

impl ProbeMeta {
    fn of(probe: &dyn Probe) -> Self {
        Self {
            uuid: probe.uuid().to_string(),
            name: probe.name().to_string(),
            passed_message: probe.passed_message().to_string(),
            failed_message: probe.failed_message().to_string(),
            requires_root: probe.requires_root(),
            report_if_disabled: probe.report_if_disabled(),
        }
    }

    /// Message for the given outcome
    #[must_use]
    pub fn message_for(&self, passed: bool) -> &str {
        if passed {
            &self.passed_message
        } else {
            &self.failed_message
        }
    }
}

/// Shared handle to one registered probe instance.
///
/// Cloning the handle shares the instance. The instance sits behind an async
/// mutex; whoever executes it holds the lock for the whole unit of work, so a
/// probe never runs concurrently with itself.
#[derive(Clone)]
pub struct ProbeHandle {
    meta: Arc<ProbeMeta>,
    probe: Arc<Mutex<Box<dyn Probe>>>,
}

impl ProbeHandle {
    /// Wrap a probe instance
    pub fn new(probe: impl Probe + 'static) -> Self {
        Self::from_boxed(Box::new(probe))
    }

    /// Wrap an already boxed probe instance
    #[must_use]
    pub fn from_boxed(probe: Box<dyn Probe>) -> Self {
        let meta = ProbeMeta::of(probe.as_ref());
        Self {
            meta: Arc::new(meta),
            probe: Arc::new(Mutex::new(probe)),
        }
    }

    /// Static facts about the probe
    #[must_use]
    pub fn meta(&self) -> &ProbeMeta {
        &self.meta
    }

    /// Probe id
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.meta.uuid
    }

    /// Exclusive access to the instance for one unit of work
    pub async fn lock(&self) -> MutexGuard<'_, Box<dyn Probe>> {
        self.probe.lock().await
    }

    /// Whether both handles point at the same instance
    #[must_use]
    pub fn same_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.probe, &other.probe)
    }
}

impl fmt::Debug for ProbeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeHandle")
            .field("uuid", &self.meta.uuid)
            .field("name", &self.meta.name)
            .finish_non_exhaustive()
    }
}

/// Runs an elevated probe on the caller's behalf.
#[async_trait]
pub trait Delegator: Send + Sync {
    /// Ask a privileged party to run the probe with this id and report whether it passed
    async fn delegate(&self, uuid: &str) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProbeState;

    struct Fixed {
        state: ProbeState,
    }

    #[async_trait]
    impl Probe for Fixed {
        fn uuid(&self) -> &str {
            "0b1c6f1e-4a77-4d7f-9f0f-3f1a1d0a0001"
        }
        fn name(&self) -> &str {
            "Fixed"
        }
        fn passed_message(&self) -> &str {
            "fine"
        }
        fn failed_message(&self) -> &str {
            "broken"
        }
        fn requires_root(&self) -> bool {
            true
        }
        async fn is_runnable(&self) -> bool {
            true
        }
        async fn run(&mut self) -> Result<()> {
            self.state.pass("fine");
            Ok(())
        }
        fn passed(&self) -> bool {
            self.state.passed()
        }
        fn status(&self) -> String {
            self.state.detail().to_string()
        }
    }

    #[tokio::test]
    async fn handle_caches_meta_and_shares_instance() {
        let handle = ProbeHandle::new(Fixed {
            state: ProbeState::default(),
        });
        let clone = handle.clone();
        assert!(handle.same_instance(&clone));
        assert!(handle.meta().requires_root);
        assert!(!handle.meta().report_if_disabled);
        assert_eq!(handle.meta().message_for(false), "broken");

        handle.lock().await.run().await.unwrap();
        assert!(clone.lock().await.passed());
    }

    #[test]
    fn separate_handles_are_distinct_instances() {
        let a = ProbeHandle::new(Fixed {
            state: ProbeState::default(),
        });
        let b = ProbeHandle::new(Fixed {
            state: ProbeState::default(),
        });
        assert_eq!(a.uuid(), b.uuid());
        assert!(!a.same_instance(&b));
    }
}
