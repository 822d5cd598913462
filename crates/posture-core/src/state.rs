//! Last-known-state store shared between the writing run and any reader
//! process (status display, tray, etc).
//!
//! The whole map lives in memory behind a mutex and is written to a single
//! TOML file in one go. Readers reload only when the file's modification
//! time is newer than the copy they hold.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;
use tracing::{debug, trace};

use crate::error::{PostureError, Result};

/// Last observed result of one probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastState {
    /// Probe id
    pub uuid: String,
    /// Whether the probe passed
    pub state: bool,
    /// Detail text of that run
    pub details: String,
}

impl LastState {
    /// Build a record
    pub fn new(uuid: impl Into<String>, state: bool, details: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            state,
            details: details.into(),
        }
    }
}

/// Storage underneath a [`LastStateStore`].
pub trait StateFile: Send + Sync {
    /// Modification time, `None` when the file does not exist
    fn modified(&self) -> io::Result<Option<SystemTime>>;

    /// Whole file contents
    fn read(&self) -> io::Result<String>;

    /// Replace the whole file contents atomically
    fn write(&self, contents: &str) -> io::Result<()>;
}

/// A state file on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsStateFile {
    path: PathBuf,
}

impl FsStateFile {
    /// State file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateFile for FsStateFile {
    fn modified(&self) -> io::Result<Option<SystemTime>> {
        match std::fs::metadata(&self.path) {
            Ok(meta) => meta.modified().map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn read(&self) -> io::Result<String> {
        std::fs::read_to_string(&self.path)
    }

    fn write(&self, contents: &str) -> io::Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;
        // Dropped (and removed) on any error before persist.
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Cache {
    states: BTreeMap<String, LastState>,
    /// Updates not yet committed; they survive a reload
    pending: BTreeMap<String, LastState>,
    loaded_at: Option<SystemTime>,
}

/// Mutex-guarded map of probe id to [`LastState`], persisted to a [`StateFile`].
#[derive(Debug)]
pub struct LastStateStore<F: StateFile = FsStateFile> {
    file: F,
    cache: Mutex<Cache>,
}

impl LastStateStore<FsStateFile> {
    /// Store backed by a file at `path`
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::with_file(FsStateFile::new(path))
    }
}

impl<F: StateFile> LastStateStore<F> {
    /// Store backed by any [`StateFile`]
    pub fn with_file(file: F) -> Self {
        Self {
            file,
            cache: Mutex::new(Cache::default()),
        }
    }

    fn cache(&self) -> MutexGuard<'_, Cache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// In-memory upsert; nothing touches disk until [`commit`](Self::commit)
    pub fn update(&self, state: LastState) {
        let mut cache = self.cache();
        cache.pending.insert(state.uuid.clone(), state.clone());
        cache.states.insert(state.uuid.clone(), state);
    }

    /// Write the whole map to the backing file.
    ///
    /// On failure the previously committed file is left as it was.
    pub fn commit(&self) -> Result<()> {
        let mut cache = self.cache();
        let body = toml::to_string(&cache.states)
            .map_err(|e| PostureError::State(format!("encode: {e}")))?;
        self.file
            .write(&body)
            .map_err(|e| PostureError::State(format!("write: {e}")))?;
        cache.loaded_at = self
            .file
            .modified()
            .map_err(|e| PostureError::State(format!("stat: {e}")))?;
        cache.pending.clear();
        debug!(records = cache.states.len(), "last state committed");
        Ok(())
    }

    /// Record for one probe
    pub fn get(&self, uuid: &str) -> Result<Option<LastState>> {
        let mut cache = self.cache();
        self.refresh(&mut cache)?;
        Ok(cache.states.get(uuid).cloned())
    }

    /// Every record, keyed by probe id
    pub fn get_all(&self) -> Result<BTreeMap<String, LastState>> {
        let mut cache = self.cache();
        self.refresh(&mut cache)?;
        Ok(cache.states.clone())
    }

    fn refresh(&self, cache: &mut Cache) -> Result<()> {
        let modified = self
            .file
            .modified()
            .map_err(|e| PostureError::State(format!("stat: {e}")))?;
        let Some(modified) = modified else {
            trace!("no state file yet, serving memory");
            return Ok(());
        };
        if cache.loaded_at.is_some_and(|seen| modified <= seen) {
            return Ok(());
        }

        let body = self
            .file
            .read()
            .map_err(|e| PostureError::State(format!("read: {e}")))?;
        let mut states: BTreeMap<String, LastState> =
            toml::from_str(&body).map_err(|e| PostureError::State(format!("decode: {e}")))?;
        states.extend(cache.pending.clone());
        cache.states = states;
        cache.loaded_at = Some(modified);
        debug!(
            records = cache.states.len(),
            pending = cache.pending.len(),
            "last state reloaded"
        );
        Ok(())
    }
}
