//! Scripted [`Host`] used by the probe tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{ProbeError, ProbeResult};
use crate::host::{CommandOutput, Host};

#[derive(Default)]
pub struct FakeHost {
    files: BTreeMap<PathBuf, Vec<u8>>,
    commands: BTreeMap<String, CommandOutput>,
    programs: BTreeSet<String>,
    home: Option<PathBuf>,
    addrs: Vec<IpAddr>,
    open: BTreeSet<SocketAddr>,
    pub invoked: Mutex<Vec<String>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, path: &str, contents: impl AsRef<[u8]>) -> Self {
        self.files
            .insert(PathBuf::from(path), contents.as_ref().to_vec());
        self
    }

    /// Script a command line; its program also becomes resolvable on PATH
    pub fn command(mut self, line: &str, output: CommandOutput) -> Self {
        if let Some(program) = line.split_whitespace().next() {
            self.programs.insert(program.to_string());
        }
        self.commands.insert(line.to_string(), output);
        self
    }

    pub fn program(mut self, name: &str) -> Self {
        self.programs.insert(name.to_string());
        self
    }

    pub fn home(mut self, path: &str) -> Self {
        self.home = Some(PathBuf::from(path));
        self
    }

    pub fn addr(mut self, ip: &str) -> Self {
        self.addrs.push(ip.parse().unwrap());
        self
    }

    pub fn listening(mut self, addr: &str) -> Self {
        self.open.insert(addr.parse().unwrap());
        self
    }
}

#[async_trait]
impl Host for FakeHost {
    async fn command(&self, program: &str, args: &[&str]) -> ProbeResult<CommandOutput> {
        let line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.invoked.lock().unwrap().push(line.clone());
        self.commands
            .get(&line)
            .cloned()
            .ok_or_else(|| ProbeError::command(program, "No such file or directory"))
    }

    async fn read_file(&self, path: &Path) -> ProbeResult<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound).into())
    }

    async fn exists(&self, path: &Path) -> bool {
        self.files.keys().any(|f| f.starts_with(path))
    }

    async fn list_dir(&self, path: &Path) -> ProbeResult<Vec<PathBuf>> {
        let entries: Vec<PathBuf> = self
            .files
            .keys()
            .filter(|f| f.parent() == Some(path))
            .cloned()
            .collect();
        if entries.is_empty() {
            return Err(std::io::Error::from(std::io::ErrorKind::NotFound).into());
        }
        Ok(entries)
    }

    fn which(&self, program: &str) -> Option<PathBuf> {
        self.programs
            .contains(program)
            .then(|| PathBuf::from("/usr/bin").join(program))
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home.clone()
    }

    fn interface_addrs(&self) -> ProbeResult<Vec<IpAddr>> {
        Ok(self.addrs.clone())
    }

    async fn dial(&self, addr: SocketAddr, _timeout: Duration) -> bool {
        self.open.contains(&addr)
    }
}
