// # -----------------------------
// # crates/store/src/lib.rs
// # -----------------------------
//! Storage engine for the wip activity log.
//!
//! Events go to month-sharded NDJSON files under `events/`; repeated context
//! (host, repository, directory) is deduplicated into `dict/` and referenced
//! by fingerprint. Every file is guarded by its own advisory lock, so
//! short-lived processes can capture and query concurrently.

pub mod config;
pub mod dict;
pub mod errors;
pub mod event;
pub mod event_log;
pub mod fs;
pub mod id;
mod json;
pub mod lock;
pub mod shard;

pub use config::StoreConfig;
pub use dict::{DictStore, DictValue, Dictionary, EnvInfo, Namespace, RepoInfo};
pub use errors::{StoreError, StoreResult};
pub use event::{Event, EventContext, EventType};
pub use event_log::EventLog;
pub use id::{EventId, Fingerprint};
pub use lock::{FileLock, LockManager, LockMode, LockTarget};
pub use shard::ShardKey;

/// An opened store: the event log and the dictionary sharing one root.
#[derive(Debug, Clone)]
pub struct Store {
    config: StoreConfig,
    events: EventLog,
    dicts: DictStore,
}

impl Store {
    /// Creates the directory layout if needed and wires up the components.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        config.prepare()?;
        let locks = LockManager::new(&config);
        Ok(Self {
            events: EventLog::new(config.clone(), locks.clone()),
            dicts: DictStore::new(config.clone(), locks),
            config,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn dicts(&self) -> &DictStore {
        &self.dicts
    }
}
