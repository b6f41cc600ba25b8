//! Month shards.
//!
//! All events whose timestamp falls in one calendar month of the process
//! local time zone live in `events/<YYYY>-<MM>.ndjson`.

use std::fmt;

use chrono::{DateTime, Datelike, Local, TimeZone};

pub const SHARD_EXTENSION: &str = "ndjson";

/// Year-month naming one shard file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShardKey {
    year: i32,
    month: u32,
}

impl ShardKey {
    /// `month` is 1-based.
    pub fn new(year: i32, month: u32) -> Self {
        debug_assert!((1..=12).contains(&month), "month out of range: {month}");
        Self { year, month }
    }

    /// Shard holding an event stamped `at`, judged in local time.
    pub fn for_time<Tz: TimeZone>(at: &DateTime<Tz>) -> Self {
        let local = at.with_timezone(&Local);
        Self::new(local.year(), local.month())
    }

    /// `2024-03`
    pub fn stem(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    /// `2024-03.ndjson`
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.stem(), SHARD_EXTENSION)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self::new(self.year + 1, 1)
        } else {
            Self::new(self.year, self.month + 1)
        }
    }

    /// Every shard from `first` through `last` inclusive, oldest first.
    /// Empty when `first` is after `last`.
    pub fn span(first: ShardKey, last: ShardKey) -> impl Iterator<Item = ShardKey> {
        let mut current = Some(first).filter(|first| *first <= last);
        std::iter::from_fn(move || {
            let key = current?;
            current = Some(key.next()).filter(|next| *next <= last);
            Some(key)
        })
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stem())
    }
}
