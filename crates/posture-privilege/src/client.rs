//! Unprivileged side of the delegation channel.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use posture_core::{Delegator, PostureError, Result};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::{debug, instrument};

use crate::config::{HelperConfig, MAX_MESSAGE_BYTES};
use crate::protocol::{HelperRequest, HelperResponse};

/// Asks the privileged helper to run elevated probes.
///
/// Calls are spaced by a client-side rate limiter so that a burst of
/// elevated probes does not trip the service manager's activation limits.
#[derive(Clone)]
pub struct HelperClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: HelperConfig,
    rate_limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl HelperClient {
    /// Create a client with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HelperConfig::default())
    }

    /// Create a client with custom settings
    #[must_use]
    pub fn with_config(config: HelperConfig) -> Self {
        let quota = Quota::per_second(config.calls_per_second);
        Self {
            inner: Arc::new(ClientInner {
                config,
                rate_limiter: RateLimiter::direct(quota),
            }),
        }
    }

    /// Settings in use
    #[must_use]
    pub fn config(&self) -> &HelperConfig {
        &self.inner.config
    }

    /// Run the probe with this id through the helper and return whether it passed
    #[instrument(skip(self), fields(socket = %self.inner.config.socket_path.display()))]
    pub async fn run_probe(&self, uuid: &str) -> Result<bool> {
        self.inner.rate_limiter.until_ready().await;

        let config = &self.inner.config;
        let unavailable = |reason: String| PostureError::HelperUnavailable {
            socket: config.socket_path.clone(),
            reason,
        };

        let mut stream = tokio::time::timeout(
            config.connect_timeout,
            UnixStream::connect(&config.socket_path),
        )
        .await
        .map_err(|_| unavailable("connect timed out".into()))?
        .map_err(|e| unavailable(e.to_string()))?;

        debug!("connected to helper");

        let body = tokio::time::timeout(config.request_timeout, async {
            stream
                .write_all(HelperRequest::new(uuid).to_line()?.as_bytes())
                .await?;
            let mut body = Vec::new();
            (&mut stream)
                .take(MAX_MESSAGE_BYTES)
                .read_to_end(&mut body)
                .await?;
            Ok::<_, PostureError>(body)
        })
        .await
        .map_err(|_| PostureError::HelperProtocol("helper did not answer in time".into()))??;

        if body.is_empty() {
            return Err(PostureError::HelperProtocol(
                "helper closed the connection without answering".into(),
            ));
        }

        let response = HelperResponse::from_bytes(&body)?;
        let passed = response
            .get(uuid)
            .ok_or_else(|| PostureError::HelperDeclined {
                uuid: uuid.to_string(),
            })?;
        debug!(passed, "helper answered");
        Ok(passed)
    }
}

impl Default for HelperClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Delegator for HelperClient {
    async fn delegate(&self, uuid: &str) -> Result<bool> {
        self.run_probe(uuid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::UnixListener;

    fn client_for(path: &std::path::Path) -> HelperClient {
        HelperClient::with_config(
            HelperConfig::new()
                .socket_path(path)
                .calls_per_second(1000),
        )
    }

    /// Accept one connection, swallow the request line, send `reply` verbatim.
    async fn reply_once(listener: UnixListener, reply: &'static [u8]) {
        let (mut stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.split();
        let mut line = String::new();
        BufReader::new(read).read_line(&mut line).await.unwrap();
        write.write_all(reply).await.unwrap();
    }

    #[tokio::test]
    async fn missing_socket_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let client = client_for(&dir.path().join("absent.sock"));
        let err = client.run_probe("abc").await.unwrap_err();
        assert!(matches!(err, PostureError::HelperUnavailable { .. }));
        assert!(err.is_infrastructure());
    }

    #[tokio::test]
    async fn default_quota_spaces_calls_a_second_apart() {
        let dir = tempfile::tempdir().unwrap();
        let client = HelperClient::with_config(
            HelperConfig::new().socket_path(dir.path().join("absent.sock")),
        );
        assert_eq!(client.config().calls_per_second.get(), 1);

        let started = std::time::Instant::now();
        for _ in 0..3 {
            let err = client.run_probe("abc").await.unwrap_err();
            assert!(matches!(err, PostureError::HelperUnavailable { .. }));
        }
        // One call is allowed up front, the next two wait for a cell each.
        assert!(started.elapsed() >= std::time::Duration::from_millis(1900));
    }

    #[tokio::test]
    async fn malformed_reply_is_protocol_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("helper.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let client = client_for(&path);

        let (_, result) = tokio::join!(reply_once(listener, b"yes please\n"), client.run_probe("abc"));
        assert!(matches!(result, Err(PostureError::HelperProtocol(_))));
    }

    #[tokio::test]
    async fn missing_entry_is_declined() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("helper.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let client = client_for(&path);

        let (_, result) = tokio::join!(reply_once(listener, b"{}\n"), client.run_probe("abc"));
        assert!(matches!(result, Err(PostureError::HelperDeclined { ref uuid }) if uuid == "abc"));
    }

    #[tokio::test]
    async fn reads_outcome_for_requested_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("helper.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let client = client_for(&path);

        let (_, result) = tokio::join!(
            reply_once(listener, b"{\"abc\":false,\"zzz\":true}\n"),
            client.delegate("abc")
        );
        assert!(!result.unwrap());
    }
}
