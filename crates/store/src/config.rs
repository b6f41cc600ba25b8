//! Store location and on-disk layout.
//!
//! A [`StoreConfig`] is handed to every component explicitly; nothing inside
//! the store looks the root up on its own. [`StoreConfig::resolve`] is the one
//! place where the platform default is computed.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use crate::errors::{StoreError, StoreResult};

const APP_DIR_NAME: &str = "wip";
const FALLBACK_DIR_NAME: &str = ".wip";

pub(crate) const EVENTS_DIR: &str = "events";
pub(crate) const DICT_DIR: &str = "dict";
pub(crate) const LOCKS_DIR: &str = "locks";

/// Root directory of a store.
///
/// Layout below the root:
///
/// ```text
/// events/<YYYY>-<MM>.ndjson   one JSON event per line, append order
/// dict/<namespace>.json       pretty-printed fingerprint -> value map
/// locks/events/<YYYY>-<MM>.lock
/// locks/dict/<namespace>.lock
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    root: PathBuf,
}

impl StoreConfig {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Uses `override_root` when given, otherwise the platform application
    /// data directory.
    pub fn resolve(override_root: Option<PathBuf>) -> StoreResult<Self> {
        match override_root {
            Some(root) => Ok(Self::new(root)),
            None => default_root()
                .map(Self::new)
                .map_err(|err| StoreError::io(None, "resolve default store root", err)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn events_dir(&self) -> PathBuf {
        self.root.join(EVENTS_DIR)
    }

    pub fn dict_dir(&self) -> PathBuf {
        self.root.join(DICT_DIR)
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.root.join(LOCKS_DIR)
    }

    /// Creates the directory tree if it does not exist yet.
    pub fn prepare(&self) -> StoreResult<()> {
        for dir in [
            self.events_dir(),
            self.dict_dir(),
            self.locks_dir().join(EVENTS_DIR),
            self.locks_dir().join(DICT_DIR),
        ] {
            std::fs::create_dir_all(&dir)
                .map_err(|err| StoreError::io(Some(dir.clone()), "create store directory", err))?;
        }
        Ok(())
    }
}

fn home_dir() -> io::Result<PathBuf> {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "Neither HOME nor USERPROFILE environment variables are set",
            )
        })
}

#[cfg(target_os = "macos")]
fn platform_config_dir() -> Option<PathBuf> {
    home_dir()
        .ok()
        .map(|home| home.join("Library").join("Application Support"))
}

#[cfg(windows)]
fn platform_config_dir() -> Option<PathBuf> {
    env::var_os("APPDATA").map(PathBuf::from)
}

#[cfg(all(unix, not(target_os = "macos")))]
fn platform_config_dir() -> Option<PathBuf> {
    env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .filter(|dir| dir.is_absolute())
        .or_else(|| home_dir().ok().map(|home| home.join(".config")))
}

#[cfg(not(any(unix, windows)))]
fn platform_config_dir() -> Option<PathBuf> {
    None
}

fn default_root() -> io::Result<PathBuf> {
    match platform_config_dir() {
        Some(dir) => Ok(dir.join(APP_DIR_NAME)),
        None => Ok(home_dir()?.join(FALLBACK_DIR_NAME)),
    }
}
