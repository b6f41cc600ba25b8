//! Event records as stored in the shards.
//!
//! One event serialises to one JSON line:
//!
//! ```json
//! {"id":"01HR...","ts":"2024-03-05T10:00:00Z","type":"note","content":"fix bug","ctx":{"repoId":"1a2b3c4d","branch":"main"}}
//! ```
//!
//! Unset optional fields are omitted rather than written as `null`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Local, TimeZone};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::id::{EventId, Fingerprint};

/// Kind of journaled occurrence. Unknown kinds written by newer tools are
/// kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    Note,
    GitCommit,
    Undo,
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::Note => "note",
            EventType::GitCommit => "git_commit",
            EventType::Undo => "undo",
            EventType::Other(other) => other.as_str(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "note" => EventType::Note,
            "git_commit" => EventType::GitCommit,
            "undo" => EventType::Undo,
            other => EventType::Other(other.to_string()),
        })
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or(EventType::Other(raw)))
    }
}

/// References to deduplicated context plus a few plain strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_id: Option<Fingerprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd_id: Option<Fingerprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_id: Option<Fingerprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<String>,
}

impl EventContext {
    pub fn is_empty(&self) -> bool {
        self == &EventContext::default()
    }
}

/// One journaled occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    #[serde(rename = "ts", with = "rfc3339")]
    pub timestamp: DateTime<FixedOffset>,
    #[serde(rename = "type")]
    pub kind: EventType,
    pub content: String,
    #[serde(default)]
    pub ctx: EventContext,
    /// Opaque extension payload; the store never looks inside.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl Event {
    /// New event stamped now, in local time.
    pub fn new(kind: EventType, content: impl Into<String>) -> Self {
        Self::at(&Local::now(), kind, content)
    }

    /// New event stamped `at`; the id encodes the same instant.
    pub fn at<Tz: TimeZone>(at: &DateTime<Tz>, kind: EventType, content: impl Into<String>) -> Self {
        Self {
            id: EventId::at(at),
            timestamp: at.fixed_offset(),
            kind,
            content: content.into(),
            ctx: EventContext::default(),
            meta: None,
        }
    }

    pub fn with_context(mut self, ctx: EventContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// `ts` codec: RFC 3339 with nanosecond precision, trailing zeros of the
/// fraction trimmed (no fraction at all on whole seconds) and `Z` for a zero
/// offset.
mod rfc3339 {
    use chrono::{DateTime, FixedOffset, Timelike};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(value: &DateTime<FixedOffset>) -> String {
        let mut text = value.format("%Y-%m-%dT%H:%M:%S").to_string();

        // leap seconds carry nanos past one second
        let nanos = value.nanosecond() % 1_000_000_000;
        if nanos != 0 {
            let digits = format!("{nanos:09}");
            text.push('.');
            text.push_str(digits.trim_end_matches('0'));
        }

        if value.offset().local_minus_utc() == 0 {
            text.push('Z');
        } else {
            text.push_str(&value.format("%:z").to_string());
        }
        text
    }

    pub fn serialize<S: Serializer>(
        value: &DateTime<FixedOffset>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<FixedOffset>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw).map_err(serde::de::Error::custom)
    }
}
