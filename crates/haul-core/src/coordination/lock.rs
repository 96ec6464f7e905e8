//! Cross-process advisory lock over the coordination directory.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::HaulError;
use crate::paths;

/// Exclusive hold on `<coordination_dir>/.coordination.lock`.
///
/// The lock is released when the value is dropped; [`CoordinationLock::release`]
/// does the same but reports errors.
#[derive(Debug)]
pub struct CoordinationLock {
    file: Option<File>,
    path: PathBuf,
}

impl CoordinationLock {
    /// Wait until the lock is free.
    pub fn acquire(coordination_dir: &Path) -> Result<Self, HaulError> {
        let (file, path) = open(coordination_dir)?;
        tracing::debug!(path = %path.display(), "Waiting for coordination lock");
        FileExt::lock_exclusive(&file).map_err(|source| HaulError::Lock {
            path: path.clone(),
            source,
        })?;
        Ok(Self { file: Some(file), path })
    }

    /// Take the lock if nobody holds it, `None` otherwise.
    pub fn try_acquire(coordination_dir: &Path) -> Result<Option<Self>, HaulError> {
        let (file, path) = open(coordination_dir)?;
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Some(Self { file: Some(file), path })),
            Err(e) if is_contended(&e) => {
                tracing::debug!(path = %path.display(), "Coordination lock busy");
                Ok(None)
            }
            Err(source) => Err(HaulError::Lock { path, source }),
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unlock, then close the handle.
    pub fn release(mut self) -> io::Result<()> {
        match self.file.take() {
            Some(file) => {
                let unlocked = FileExt::unlock(&file);
                drop(file);
                unlocked
            }
            None => Ok(()),
        }
    }
}

impl Drop for CoordinationLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = FileExt::unlock(&file) {
                tracing::warn!(path = %self.path.display(), "Failed to release coordination lock: {e}");
            }
        }
    }
}

fn open(coordination_dir: &Path) -> Result<(File, PathBuf), HaulError> {
    std::fs::create_dir_all(coordination_dir).map_err(|source| HaulError::CoordinationDir {
        path: coordination_dir.to_path_buf(),
        source,
    })?;
    let path = paths::lock_path(coordination_dir);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .map_err(|source| HaulError::Lock {
            path: path.clone(),
            source,
        })?;
    Ok((file, path))
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
