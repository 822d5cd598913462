//! Access to the local system, behind a trait so probes can be exercised
//! against a scripted host in tests.

use async_trait::async_trait;
use std::ffi::OsString;
use std::net::{IpAddr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::error::{ProbeError, ProbeResult};

/// What a finished command printed and how it exited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if killed by a signal
    pub code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl CommandOutput {
    /// Output of a command that exited with status 0
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Output of a command that exited with the given status
    pub fn exit(code: i32, stdout: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Whether the command exited with status 0
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Standard output without surrounding whitespace
    #[must_use]
    pub fn trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// Everything a probe may observe about the machine.
#[async_trait]
pub trait Host: Send + Sync {
    /// Run a program to completion.
    ///
    /// A non-zero exit is not an error; failing to spawn is.
    async fn command(&self, program: &str, args: &[&str]) -> ProbeResult<CommandOutput>;

    /// Whole contents of a file
    async fn read_file(&self, path: &Path) -> ProbeResult<Vec<u8>>;

    /// Whole contents of a file, lossily decoded
    async fn read_to_string(&self, path: &Path) -> ProbeResult<String> {
        let bytes = self.read_file(path).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Whether a file or directory exists
    async fn exists(&self, path: &Path) -> bool;

    /// Entries of a directory, sorted
    async fn list_dir(&self, path: &Path) -> ProbeResult<Vec<PathBuf>>;

    /// Resolve a program name through `PATH`
    fn which(&self, program: &str) -> Option<PathBuf>;

    /// Home directory of the invoking user
    fn home_dir(&self) -> Option<PathBuf>;

    /// Addresses assigned to local network interfaces, loopback excluded
    fn interface_addrs(&self) -> ProbeResult<Vec<IpAddr>>;

    /// Whether a TCP connection to `addr` succeeds within `timeout`
    async fn dial(&self, addr: SocketAddr, timeout: Duration) -> bool;
}

/// The real machine this process runs on.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

impl SystemHost {
    /// Handle to the local system
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Host for SystemHost {
    async fn command(&self, program: &str, args: &[&str]) -> ProbeResult<CommandOutput> {
        trace!(program, ?args, "spawning");
        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ProbeError::command(program, e))?;

        let output = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(program, code = ?output.code, "command finished");
        Ok(output)
    }

    async fn read_file(&self, path: &Path) -> ProbeResult<Vec<u8>> {
        Ok(tokio::fs::read(path).await?)
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn list_dir(&self, path: &Path) -> ProbeResult<Vec<PathBuf>> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(path).await?;
        while let Some(entry) = dir.next_entry().await? {
            entries.push(entry.path());
        }
        entries.sort();
        Ok(entries)
    }

    fn which(&self, program: &str) -> Option<PathBuf> {
        lookup(program, std::env::var_os("PATH"))
    }

    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }

    fn interface_addrs(&self) -> ProbeResult<Vec<IpAddr>> {
        let addrs = nix::ifaddrs::getifaddrs()
            .map_err(|e| ProbeError::Io(std::io::Error::from(e)))?;

        let mut ips: Vec<IpAddr> = addrs
            .filter_map(|ifaddr| {
                let addr = ifaddr.address?;
                if let Some(v4) = addr.as_sockaddr_in() {
                    return Some(IpAddr::V4(*SocketAddrV4::from(*v4).ip()));
                }
                addr.as_sockaddr_in6()
                    .map(|v6| IpAddr::V6(*SocketAddrV6::from(*v6).ip()))
            })
            .filter(is_dialable)
            .collect();
        ips.sort();
        ips.dedup();
        Ok(ips)
    }

    async fn dial(&self, addr: SocketAddr, timeout: Duration) -> bool {
        matches!(
            tokio::time::timeout(timeout, TcpStream::connect(addr)).await,
            Ok(Ok(_))
        )
    }
}

/// Executable named `program` on the given search path
fn lookup(program: &str, paths: Option<OsString>) -> Option<PathBuf> {
    let found = which::which_in(program, paths, "/").ok();
    trace!(program, ?found, "program lookup");
    found
}

/// Loopback and IPv6 link-local addresses are not dialled
fn is_dialable(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => !v4.is_loopback() && !v4.is_unspecified(),
        IpAddr::V6(v6) => {
            !v6.is_loopback() && !v6.is_unspecified() && (v6.segments()[0] & 0xffc0) != 0xfe80
        }
    }
}
