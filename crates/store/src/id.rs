//! Event identifiers and context fingerprints.
//!
//! [`EventId`] is a ULID: a 48-bit millisecond timestamp followed by 80 bits
//! of randomness, rendered as 26 Crockford base32 characters. Lexicographic
//! order of the string matches chronological order, and the creation time is
//! recoverable from the id alone, which is how update and delete find their
//! shard without scanning.
//!
//! [`Fingerprint`] is the dedup key of the dictionary store: the first eight
//! hex characters of SHA-256 over a canonical string.

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use ulid::Ulid;

use crate::errors::StoreError;

const FINGERPRINT_LEN: usize = 8;

/// Last id handed out by this process, used to keep ids minted within the
/// same millisecond strictly increasing.
static LAST_ID: Lazy<Mutex<Option<Ulid>>> = Lazy::new(|| Mutex::new(None));

/// Time-ordered, globally unique event identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(Ulid);

impl EventId {
    /// Mints an id for the current instant.
    pub fn generate() -> Self {
        Self::at_system_time(SystemTime::now())
    }

    /// Mints an id whose embedded timestamp is `at`, truncated to the
    /// millisecond.
    ///
    /// ULIDs cannot encode instants before 1970; those clamp to the epoch,
    /// and the event log refuses to file such events since the id would
    /// name the wrong shard.
    pub fn at<Tz: TimeZone>(at: &DateTime<Tz>) -> Self {
        let millis = at.timestamp_millis();
        let time = if millis >= 0 {
            UNIX_EPOCH + Duration::from_millis(millis as u64)
        } else {
            UNIX_EPOCH
        };
        Self::at_system_time(time)
    }

    fn at_system_time(time: SystemTime) -> Self {
        let fresh = Ulid::from_datetime(time);
        let mut last = match LAST_ID.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let next = next_after(*last, fresh);
        *last = Some(next);
        Self(next)
    }

    /// Creation instant encoded in the id, millisecond precision.
    pub fn timestamp(&self) -> DateTime<Utc> {
        let millis = self.0.timestamp_ms() as i64;
        Utc.timestamp_millis_opt(millis)
            .single()
            .unwrap_or_default()
    }
}

/// Within one millisecond the random part of the previous id is bumped so
/// ordering holds; otherwise the fresh id is used as is.
fn next_after(prev: Option<Ulid>, fresh: Ulid) -> Ulid {
    match prev {
        Some(prev) if prev.timestamp_ms() == fresh.timestamp_ms() => {
            prev.increment().unwrap_or(fresh)
        }
        _ => fresh,
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s.trim())
            .map(Self)
            .map_err(|err| StoreError::InvalidEventId {
                id: s.to_string(),
                reason: err.to_string(),
            })
    }
}

impl Serialize for EventId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ulid::from_string(&raw)
            .map(Self)
            .map_err(|err| serde::de::Error::custom(format!("invalid event id '{raw}': {err}")))
    }
}

/// Short deterministic key derived from a canonical context string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(canonical: &str) -> Self {
        let digest = Sha256::digest(canonical.as_bytes());
        let mut encoded = hex::encode(digest);
        encoded.truncate(FINGERPRINT_LEN);
        Self(encoded)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
