//! Shared helpers for store integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use wips_store::{Event, EventType, ShardKey, Store, StoreConfig};

pub struct Tmp {
    pub dir: tempfile::TempDir,
}

impl Tmp {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A fresh handle on the store in this directory, as a separate process
    /// would open it.
    pub fn store(&self) -> Store {
        Store::open(StoreConfig::new(self.path())).unwrap()
    }

    pub fn shard_path(&self, at: &DateTime<Utc>) -> PathBuf {
        self.store().events().shard_path(ShardKey::for_time(at))
    }
}

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

pub fn note_at(at: DateTime<Utc>, content: &str) -> Event {
    Event::at(&at, EventType::Note, content)
}
