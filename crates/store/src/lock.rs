//! # Per-File Advisory Locking
//!
//! Every data file has a sidecar lock file under `<root>/locks/`; the lock is
//! taken on the sidecar, never on the data file, because rewrites replace the
//! data file by rename and a lock held on the old inode would stop protecting
//! anything.
//!
//! ## Policy
//!
//! | Operation                      | Mode      | Waits? |
//! |--------------------------------|-----------|--------|
//! | append                         | exclusive | no     |
//! | scan, load                     | shared    | yes    |
//! | update, delete, save_if_absent | exclusive | yes    |
//!
//! Locks are `flock`-style (via `fs2`), so they are tied to the open file
//! description: two handles opened separately conflict even inside one
//! process, and the kernel drops them if the holder dies.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::config::{StoreConfig, DICT_DIR, EVENTS_DIR};
use crate::dict::Namespace;
use crate::errors::{StoreError, StoreResult};
use crate::shard::ShardKey;

/// File whose access is being serialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTarget {
    Shard(ShardKey),
    Dict(Namespace),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Hands out scoped locks on store files.
#[derive(Debug, Clone)]
pub struct LockManager {
    locks_dir: PathBuf,
}

impl LockManager {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            locks_dir: config.locks_dir(),
        }
    }

    pub fn lock_path(&self, target: LockTarget) -> PathBuf {
        match target {
            LockTarget::Shard(key) => self
                .locks_dir
                .join(EVENTS_DIR)
                .join(format!("{}.lock", key.stem())),
            LockTarget::Dict(namespace) => self
                .locks_dir
                .join(DICT_DIR)
                .join(format!("{}.lock", namespace.file_stem())),
        }
    }

    /// Takes an exclusive lock or fails immediately with `LockUnavailable`.
    ///
    /// `data_path` is only used to name the busy file in the error.
    pub fn try_exclusive(&self, target: LockTarget, data_path: &Path) -> StoreResult<FileLock> {
        let path = self.lock_path(target);
        let file = open_lock_file(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(lock = %path.display(), "acquired exclusive lock (non-blocking)");
                Ok(FileLock::new(file, path, LockMode::Exclusive))
            }
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => {
                debug!(lock = %path.display(), "lock busy");
                Err(StoreError::LockUnavailable {
                    path: data_path.to_path_buf(),
                })
            }
            Err(err) => Err(StoreError::io(Some(path), "try exclusive lock", err)),
        }
    }

    /// Waits for an exclusive lock.
    pub fn exclusive(&self, target: LockTarget) -> StoreResult<FileLock> {
        self.blocking(target, LockMode::Exclusive)
    }

    /// Waits for a shared lock; any number of readers may hold it together.
    pub fn shared(&self, target: LockTarget) -> StoreResult<FileLock> {
        self.blocking(target, LockMode::Shared)
    }

    fn blocking(&self, target: LockTarget, mode: LockMode) -> StoreResult<FileLock> {
        let path = self.lock_path(target);
        let file = open_lock_file(&path)?;

        let result = match mode {
            LockMode::Shared => file.lock_shared(),
            LockMode::Exclusive => file.lock_exclusive(),
        };
        result.map_err(|err| StoreError::io(Some(path.clone()), "acquire lock", err))?;

        debug!(lock = %path.display(), ?mode, "acquired lock");
        Ok(FileLock::new(file, path, mode))
    }
}

fn open_lock_file(path: &Path) -> StoreResult<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| {
            StoreError::io(Some(parent.to_path_buf()), "create lock directory", err)
        })?;
    }

    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|err| StoreError::io(Some(path.to_path_buf()), "open lock file", err))
}

/// Held lock; released when dropped.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl FileLock {
    fn new(file: File, path: PathBuf, mode: LockMode) -> Self {
        Self { file, path, mode }
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // closing the descriptor releases the lock anyway
        if let Err(err) = self.file.unlock() {
            debug!(lock = %self.path.display(), error = %err, "unlock failed");
        }
    }
}
