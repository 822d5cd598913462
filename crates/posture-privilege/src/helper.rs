//! Privileged side of the delegation channel.
//!
//! The helper is started by the service manager once per connection, with
//! the listening socket handed over on stdin. It answers exactly one request
//! and exits; there is no long-running daemon.

use posture_core::{ProbeHandle, Registry, Result};
use std::os::fd::AsFd;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, instrument, warn};

use crate::config::MAX_MESSAGE_BYTES;
use crate::protocol::{HelperRequest, HelperResponse};

/// Why a request was or was not allowed through.
#[derive(Debug)]
pub enum HelperDecision {
    /// The probe may run with elevated rights
    Allowed(ProbeHandle),
    /// No probe has the requested id
    UnknownProbe,
    /// The probe does not need root, so it is never run here
    NotPrivileged,
    /// The probe cannot run on this host
    NotRunnable,
}

impl HelperDecision {
    /// Whether the request may proceed
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed(_))
    }
}

/// One-shot server that runs root-only probes for unprivileged callers.
pub struct Helper<'a> {
    registry: &'a Registry,
    read_timeout: Duration,
}

impl<'a> Helper<'a> {
    /// Helper over the given catalogue
    #[must_use]
    pub const fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            read_timeout: Duration::from_secs(10),
        }
    }

    /// Set how long to wait for the request line
    #[must_use]
    pub const fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Only root-only, runnable, registered probes may be run on a caller's behalf
    pub async fn authorize(&self, uuid: &str) -> HelperDecision {
        let Some(handle) = self.registry.get(uuid) else {
            return HelperDecision::UnknownProbe;
        };
        if !handle.meta().requires_root {
            return HelperDecision::NotPrivileged;
        }
        if !handle.lock().await.is_runnable().await {
            return HelperDecision::NotRunnable;
        }
        HelperDecision::Allowed(handle.clone())
    }

    /// Accept exactly one connection and handle it
    pub async fn serve_one(&self, listener: &UnixListener) -> Result<()> {
        let (stream, _) = listener.accept().await?;
        debug!("accepted delegation connection");
        self.handle(stream).await
    }

    /// Read one request, answer it, close.
    ///
    /// Undecodable requests are dropped without an answer.
    #[instrument(skip_all)]
    pub async fn handle(&self, mut stream: UnixStream) -> Result<()> {
        let mut line = String::new();
        let read = {
            let (reader, _) = stream.split();
            let mut reader = BufReader::new(reader.take(MAX_MESSAGE_BYTES));
            tokio::time::timeout(self.read_timeout, reader.read_line(&mut line)).await
        };
        match read {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                warn!(error = %e, "failed to read request");
                return Ok(());
            }
            Err(_) => {
                warn!("timed out waiting for request");
                return Ok(());
            }
        }

        let request = match HelperRequest::from_line(&line) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "undecodable request, closing");
                return Ok(());
            }
        };

        let response = self.respond(&request.uuid).await;
        stream.write_all(response.to_line()?.as_bytes()).await?;
        stream.shutdown().await?;
        Ok(())
    }

    async fn respond(&self, uuid: &str) -> HelperResponse {
        let handle = match self.authorize(uuid).await {
            HelperDecision::Allowed(handle) => handle,
            decision => {
                warn!(uuid, ?decision, "declined delegated probe");
                return HelperResponse::declined();
            }
        };

        let mut probe = handle.lock().await;
        match probe.run().await {
            Ok(()) => {
                let passed = probe.passed();
                info!(uuid, passed, "ran delegated probe");
                HelperResponse::outcome(uuid, passed)
            }
            Err(e) => {
                warn!(uuid, error = %e, "delegated probe failed to run");
                HelperResponse::declined()
            }
        }
    }
}

/// Listener handed over by the service manager on standard input
pub fn inherited_listener() -> Result<UnixListener> {
    let fd = std::io::stdin().as_fd().try_clone_to_owned()?;
    let listener = std::os::unix::net::UnixListener::from(fd);
    listener.set_nonblocking(true)?;
    Ok(UnixListener::from_std(listener)?)
}

/// Listener bound to an explicit path, replacing a stale socket file
pub fn bind(path: &Path) -> Result<UnixListener> {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed stale socket"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(UnixListener::bind(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::HelperClient;
    use crate::config::HelperConfig;
    use async_trait::async_trait;
    use posture_core::{PostureError, Probe, ProbeState};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const ROOT_PROBE: &str = "cbf2736b-72df-43e3-8789-8eb676ff9014";
    const USER_PROBE: &str = "ef69f752-0e89-46e2-a644-310429ae5f45";
    const ABSENT_PROBE: &str = "c3aee29a-f16d-4573-a861-b3ba0d860067";

    struct Stub {
        uuid: &'static str,
        root: bool,
        runnable: bool,
        runs: Arc<AtomicUsize>,
        state: ProbeState,
    }

    #[async_trait]
    impl Probe for Stub {
        fn uuid(&self) -> &str {
            self.uuid
        }
        fn name(&self) -> &str {
            "stub"
        }
        fn passed_message(&self) -> &str {
            "good"
        }
        fn failed_message(&self) -> &str {
            "bad"
        }
        fn requires_root(&self) -> bool {
            self.root
        }
        async fn is_runnable(&self) -> bool {
            self.runnable
        }
        async fn run(&mut self) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.state.pass("good");
            Ok(())
        }
        fn passed(&self) -> bool {
            self.state.passed()
        }
        fn status(&self) -> String {
            self.state.detail().to_string()
        }
    }

    fn registry(runs: &Arc<AtomicUsize>) -> Registry {
        let mut registry = Registry::new();
        for (uuid, root, runnable) in [
            (ROOT_PROBE, true, true),
            (USER_PROBE, false, true),
            (ABSENT_PROBE, true, false),
        ] {
            let probe = Stub {
                uuid,
                root,
                runnable,
                runs: Arc::clone(runs),
                state: ProbeState::default(),
            };
            registry.register("System Integrity", ProbeHandle::new(probe)).unwrap();
        }
        registry
    }

    fn client_for(path: &Path) -> HelperClient {
        HelperClient::with_config(HelperConfig::new().socket_path(path).calls_per_second(1000))
    }

    #[tokio::test]
    async fn runs_root_probe_and_reports_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("helper.sock");
        let runs = Arc::new(AtomicUsize::new(0));
        let registry = registry(&runs);
        let listener = bind(&path).unwrap();
        let helper = Helper::new(&registry);
        let client = client_for(&path);

        let (served, passed) = tokio::join!(helper.serve_one(&listener), client.run_probe(ROOT_PROBE));
        served.unwrap();
        assert!(passed.unwrap());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn declines_probe_that_does_not_need_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("helper.sock");
        let runs = Arc::new(AtomicUsize::new(0));
        let registry = registry(&runs);
        let listener = bind(&path).unwrap();
        let helper = Helper::new(&registry);
        let client = client_for(&path);

        let (served, result) = tokio::join!(helper.serve_one(&listener), client.run_probe(USER_PROBE));
        served.unwrap();
        assert!(matches!(result, Err(PostureError::HelperDeclined { .. })));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn authorize_explains_refusals() {
        let runs = Arc::new(AtomicUsize::new(0));
        let registry = registry(&runs);
        let helper = Helper::new(&registry);

        assert!(helper.authorize(ROOT_PROBE).await.is_allowed());
        assert!(matches!(helper.authorize(USER_PROBE).await, HelperDecision::NotPrivileged));
        assert!(matches!(helper.authorize(ABSENT_PROBE).await, HelperDecision::NotRunnable));
        assert!(matches!(helper.authorize("nope").await, HelperDecision::UnknownProbe));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn undecodable_request_gets_no_answer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("helper.sock");
        let runs = Arc::new(AtomicUsize::new(0));
        let registry = registry(&runs);
        let listener = bind(&path).unwrap();
        let helper = Helper::new(&registry);

        let talk = async {
            let mut stream = UnixStream::connect(&path).await.unwrap();
            stream.write_all(b"run everything\n").await.unwrap();
            let mut body = Vec::new();
            stream.read_to_end(&mut body).await.unwrap();
            body
        };
        let (served, body) = tokio::join!(helper.serve_one(&listener), talk);
        served.unwrap();
        assert!(body.is_empty());
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn bind_replaces_stale_socket_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("helper.sock");
        drop(bind(&path).unwrap());
        assert!(path.exists());
        bind(&path).unwrap();
    }
}
