//! Shared on-disk state: the coordination lock, the registry and the lockfile.
//!
//! All three live in one directory. Every read-modify-write of the registry or
//! lockfile happens while [`Coordinator`] holds the lock.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::LockMode;
use crate::error::HaulError;
use crate::paths;

pub mod lock;
pub mod lockfile;
pub mod registry;

pub use lock::CoordinationLock;
pub use lockfile::{LockEntry, Lockfile};
pub use registry::{CallerConstraint, ConstraintConflict, MergedConstraint, Registry};

/// Registry and lockfile loaded under the coordination lock.
#[derive(Debug)]
pub struct Coordinator {
    dir: PathBuf,
    lock: Option<CoordinationLock>,
    /// Every caller's constraints.
    pub registry: Registry,
    /// What is installed.
    pub lockfile: Lockfile,
}

impl Coordinator {
    /// Lock `dir` according to `mode` and load both files.
    ///
    /// In [`LockMode::NonBlocking`] a busy lock is not an error: the state is
    /// still read, but [`Coordinator::persist`] will not write it back.
    pub fn open(dir: &Path, mode: LockMode) -> Result<Self, HaulError> {
        let lock = match mode {
            LockMode::Blocking => Some(CoordinationLock::acquire(dir)?),
            LockMode::NonBlocking => {
                let lock = CoordinationLock::try_acquire(dir)?;
                if lock.is_none() {
                    tracing::warn!(
                        dir = %dir.display(),
                        "Coordination lock is held elsewhere, continuing without it"
                    );
                }
                lock
            }
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            registry: Registry::load(&paths::registry_path(dir)),
            lockfile: Lockfile::load(&paths::lockfile_path(dir)),
            lock,
        })
    }

    /// The coordination directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether this process holds the lock.
    pub fn is_coordinated(&self) -> bool {
        self.lock.is_some()
    }

    /// Write the registry and lockfile back, if the lock is held.
    pub fn persist(&self) -> Result<(), HaulError> {
        if !self.is_coordinated() {
            tracing::debug!("Not holding the coordination lock, leaving state untouched");
            return Ok(());
        }
        let registry_path = paths::registry_path(&self.dir);
        self.registry
            .save(&registry_path)
            .map_err(|source| HaulError::Persist {
                path: registry_path,
                source,
            })?;
        let lockfile_path = paths::lockfile_path(&self.dir);
        self.lockfile
            .save(&lockfile_path)
            .map_err(|source| HaulError::Persist {
                path: lockfile_path,
                source,
            })
    }

    /// Release the lock, reporting a failed unlock instead of only logging it.
    pub fn release(mut self) -> io::Result<()> {
        match self.lock.take() {
            Some(lock) => lock.release(),
            None => Ok(()),
        }
    }
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Parse `path` as JSON, treating a missing or corrupt file as absent.
pub(crate) fn load_json<T: DeserializeOwned>(path: &Path, what: &str) -> Option<T> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), "Failed to read {what}, starting fresh: {e}");
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(path = %path.display(), "Corrupt {what}, starting fresh: {e}");
            None
        }
    }
}

/// Pretty-print `value` to a temp file beside `path` and rename it over `path`.
pub(crate) fn save_json<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let mut content = serde_json::to_vec_pretty(value).map_err(io::Error::other)?;
    content.push(b'\n');
    let mut tmp = paths::temp_file_beside(path)?;
    tmp.write_all(&content)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
