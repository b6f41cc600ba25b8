//! Shared state for the commands that touch the store.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Local, TimeZone};
use path_clean::PathClean;
use tracing::{debug, warn};
use wips_store::{Dictionary, Event, Namespace, Store, StoreConfig};

use crate::config::{config_path, UserConfig};

pub struct App {
    pub store: Store,
    pub config: UserConfig,
    /// `None` when the working directory is gone or unreadable.
    pub cwd: Option<PathBuf>,
}

impl App {
    /// Loads the user config, resolves the store root and prepares the store.
    pub fn init(home: Option<PathBuf>) -> Result<Self> {
        let path = config_path()?;
        let config = UserConfig::load(&path).context("failed to load config")?;

        let store_config = StoreConfig::resolve(config.store_root(home))
            .context("failed to resolve store location")?;
        debug!(root = %store_config.root().display(), "opening store");
        let store = Store::open(store_config).context("failed to prepare store")?;

        Ok(Self::new(store, config, std::env::current_dir().ok()))
    }

    pub fn new(store: Store, config: UserConfig, cwd: Option<PathBuf>) -> Self {
        Self { store, config, cwd }
    }

    pub fn hidden_dirs(&self) -> &[String] {
        &self.config.hidden_directories
    }

    /// Namespace contents for display; an unreadable file only costs labels.
    pub fn dictionary(&self, namespace: Namespace) -> Dictionary {
        self.store.dicts().load(namespace).unwrap_or_else(|err| {
            warn!(namespace = namespace.file_stem(), error = %err, "dictionary unavailable");
            Dictionary::empty(namespace)
        })
    }

    /// Most recent event recorded this month, up to now.
    pub fn latest_this_month(&self) -> Result<Option<Event>> {
        let now = Local::now();
        let start = start_of_month(&now)?;

        let events = self
            .store
            .events()
            .scan(&start, &now)
            .context("failed to get events")?;
        Ok(events.into_iter().last())
    }
}

/// Local midnight on the first day of `now`'s month.
pub fn start_of_month(now: &DateTime<Local>) -> Result<DateTime<Local>> {
    Local
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .earliest()
        .context("start of month does not exist in local time")
}

/// Absolute, lexically normalised form of `path` taken relative to `cwd`.
pub fn absolute(cwd: &Path, path: &str) -> PathBuf {
    cwd.join(path).clean()
}
