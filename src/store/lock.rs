//! store::lock
//!
//! Exclusive writer lock for the file-backed store.
//!
//! # Architecture
//!
//! The store lock serializes writers across processes (and across tasks of
//! one process) at `<root>/lock`. Readers never take it: writes are atomic
//! renames, so a reader sees either the old or the new file.
//!
//! # Invariants
//!
//! - Lock must be held for the whole read-modify-write of a scope file
//! - Lock is automatically released on drop (RAII pattern)
//! - `acquire` blocks; `try_acquire` fails fast
//!
//! # Example
//!
//! ```ignore
//! use pipeline_defaults::core::paths::StorePaths;
//! use pipeline_defaults::store::lock::StoreLock;
//!
//! let paths = StorePaths::new("/srv/defaults".into());
//! let lock = StoreLock::acquire(&paths)?;
//! // ... rewrite a scope file ...
//! drop(lock);
//! ```

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::StorePaths;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another writer already holds the lock.
    #[error("store is locked by another writer")]
    AlreadyLocked,

    /// Failed to create lock file or directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),
}

/// An exclusive lock on the store.
#[derive(Debug)]
pub struct StoreLock {
    /// Path to the lock file.
    path: PathBuf,
    /// The open file handle with the lock held.
    file: Option<File>,
}

impl StoreLock {
    /// Acquire the store lock, waiting for other writers.
    ///
    /// Blocks the calling thread; async callers run this inside
    /// `spawn_blocking`.
    pub fn acquire(paths: &StorePaths) -> Result<Self, LockError> {
        let file = Self::open(paths)?;
        file.lock_exclusive()
            .map_err(|e| LockError::AcquireFailed(e.to_string()))?;
        Ok(Self {
            path: paths.lock_path(),
            file: Some(file),
        })
    }

    /// Try to acquire the store lock without waiting.
    ///
    /// Returns `None` if another writer holds it.
    pub fn try_acquire(paths: &StorePaths) -> Result<Option<Self>, LockError> {
        let file = Self::open(paths)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                path: paths.lock_path(),
                file: Some(file),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    fn open(paths: &StorePaths) -> Result<File, LockError> {
        fs::create_dir_all(paths.root()).map_err(|e| {
            LockError::CreateFailed(format!("cannot create {}: {}", paths.root().display(), e))
        })?;

        let path = paths.lock_path();
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e)))
    }

    /// Check if the lock is currently held.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Get the path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_paths(dir: &Path) -> StorePaths {
        StorePaths::new(dir.join("store"))
    }

    #[test]
    fn acquire_creates_root() {
        let temp = TempDir::new().unwrap();
        let paths = test_paths(temp.path());

        let lock = StoreLock::acquire(&paths).expect("acquire lock");
        assert!(lock.is_held());
        assert!(lock.path().exists());
    }

    #[test]
    fn try_acquire_returns_none_when_locked() {
        let temp = TempDir::new().unwrap();
        let paths = test_paths(temp.path());

        let _lock = StoreLock::acquire(&paths).expect("first acquire");
        let second = StoreLock::try_acquire(&paths).expect("try_acquire");
        assert!(second.is_none());
    }

    #[test]
    fn released_on_drop() {
        let temp = TempDir::new().unwrap();
        let paths = test_paths(temp.path());

        drop(StoreLock::acquire(&paths).expect("first acquire"));

        let again = StoreLock::try_acquire(&paths).expect("try_acquire");
        assert!(again.is_some());
    }
}
