//! # Event Log
//!
//! Append-only, month-sharded record store. Each shard is newline-delimited
//! JSON, one [`Event`] per line, in append order.
//!
//! ## Operations
//!
//! - [`EventLog::append`] writes one line under a non-blocking exclusive lock
//! - [`EventLog::scan`] streams the shards a time range touches under shared
//!   locks and keeps the records inside the range, bounds included
//! - [`EventLog::get_by_id`], [`EventLog::update_by_id`] and
//!   [`EventLog::delete_by_id`] find the shard from the id's embedded
//!   timestamp, never by searching other months
//!
//! ## Trailing fragments
//!
//! A process killed mid-append can leave a final line without its newline.
//! Such a line is ignored (with a warning) when it does not decode, and the
//! next append cuts it off before writing. Every other malformed line is a
//! hard [`StoreError::Decode`] for that shard.
//!
//! ## Shard placement
//!
//! A record lives in the shard of its timestamp, and that must be the month
//! its id encodes. Appends and updates that would break this are refused.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::errors::{StoreError, StoreResult};
use crate::event::Event;
use crate::fs::replace_file;
use crate::id::EventId;
use crate::json;
use crate::lock::{LockManager, LockTarget};
use crate::shard::ShardKey;

/// Handle on the `events/` directory of one store.
#[derive(Debug, Clone)]
pub struct EventLog {
    config: StoreConfig,
    locks: LockManager,
}

impl EventLog {
    pub fn new(config: StoreConfig, locks: LockManager) -> Self {
        Self { config, locks }
    }

    pub fn shard_path(&self, key: ShardKey) -> PathBuf {
        self.config.events_dir().join(key.file_name())
    }

    /// Appends `event` to the shard of its timestamp.
    ///
    /// Fails with [`StoreError::LockUnavailable`] at once if anyone else
    /// holds the shard; it never waits. An event whose id resolves to a
    /// different month than its timestamp is refused with
    /// [`StoreError::ShardMismatch`].
    pub fn append(&self, event: &Event) -> StoreResult<()> {
        let key = ShardKey::for_time(&event.timestamp);
        ensure_filed_by_id(event, key)?;
        let path = self.shard_path(key);
        debug!(id = %event.id, shard = %key, "appending event");

        let record = json::to_line(event, "event")?;

        let _lock = self.locks.try_exclusive(LockTarget::Shard(key), &path)?;

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|err| StoreError::io(Some(path.clone()), "open shard for append", err))?;

        let mut buffer = repair_tail(&mut file, &path)?;
        buffer.extend_from_slice(&record);

        file.write_all(&buffer)
            .and_then(|_| file.sync_data())
            .map_err(|err| StoreError::io(Some(path.clone()), "append event", err))?;

        Ok(())
    }

    /// Events with `start <= timestamp <= end`, shard by shard, oldest shard
    /// first. Within a shard the order is append order; nothing is re-sorted.
    pub fn scan<Tz: TimeZone>(
        &self,
        start: &DateTime<Tz>,
        end: &DateTime<Tz>,
    ) -> StoreResult<Vec<Event>> {
        let from = start.with_timezone(&Utc);
        let to = end.with_timezone(&Utc);
        if from > to {
            return Ok(Vec::new());
        }

        let mut events = Vec::new();
        for key in ShardKey::span(ShardKey::for_time(start), ShardKey::for_time(end)) {
            let in_range = |event: &Event| {
                let at = event.timestamp.with_timezone(&Utc);
                at >= from && at <= to
            };
            if let Some(found) = self.read_locked(key, in_range)? {
                events.extend(found);
            }
        }
        Ok(events)
    }

    /// Every record of one shard; empty if the shard does not exist.
    pub fn read_shard(&self, key: ShardKey) -> StoreResult<Vec<Event>> {
        Ok(self.read_locked(key, |_| true)?.unwrap_or_default())
    }

    /// Point lookup through the id's embedded timestamp.
    pub fn get_by_id(&self, id: &str) -> StoreResult<Event> {
        let event_id: EventId = id.parse()?;
        let key = ShardKey::for_time(&event_id.timestamp());

        self.read_locked(key, |event| event.id == event_id)?
            .and_then(|found| found.into_iter().next())
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    /// Applies `mutator` to the record with `id` and rewrites its shard.
    ///
    /// The mutator may change anything except the id, and the timestamp
    /// only within the month the id names. Other records are written back
    /// unchanged and in the same order. Returns the updated record.
    pub fn update_by_id<F>(&self, id: &str, mutator: F) -> StoreResult<Event>
    where
        F: FnOnce(&mut Event),
    {
        let updated = self.rewrite(id, |events, index| {
            let mut updated = events[index].clone();
            mutator(&mut updated);
            if updated.id != events[index].id {
                return Err(StoreError::IdReassigned { id: id.to_string() });
            }
            ensure_filed_by_id(&updated, ShardKey::for_time(&updated.timestamp))?;
            events[index] = updated.clone();
            Ok(updated)
        })?;
        info!(id = %updated.id, "event updated");
        Ok(updated)
    }

    /// Removes the record with `id` and returns it.
    pub fn delete_by_id(&self, id: &str) -> StoreResult<Event> {
        let removed = self.rewrite(id, |events, index| Ok(events.remove(index)))?;
        info!(id = %removed.id, "event deleted");
        Ok(removed)
    }

    /// Shared-locked read of one shard; `None` when the file does not exist.
    fn read_locked(
        &self,
        key: ShardKey,
        keep: impl FnMut(&Event) -> bool,
    ) -> StoreResult<Option<Vec<Event>>> {
        let path = self.shard_path(key);
        if !path.exists() {
            debug!(shard = %key, "shard missing, treated as empty");
            return Ok(None);
        }

        let _lock = self.locks.shared(LockTarget::Shard(key))?;
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::io(Some(path), "open shard", err)),
        };

        read_records(&path, BufReader::new(file), keep).map(Some)
    }

    /// Exclusive read-modify-write of the shard holding `id`. `edit` receives
    /// all records and the index of the target; when it fails, or the id is
    /// absent, the shard is left as it was.
    fn rewrite<T>(
        &self,
        id: &str,
        edit: impl FnOnce(&mut Vec<Event>, usize) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let event_id: EventId = id.parse()?;
        let key = ShardKey::for_time(&event_id.timestamp());
        let path = self.shard_path(key);
        debug!(%event_id, shard = %key, "rewriting shard");

        let _lock = self.locks.exclusive(LockTarget::Shard(key))?;

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound { id: id.to_string() })
            }
            Err(err) => return Err(StoreError::io(Some(path), "open shard", err)),
        };
        let mut events = read_records(&path, BufReader::new(file), |_| true)?;

        let index = events
            .iter()
            .position(|event| event.id == event_id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;

        let outcome = edit(&mut events, index)?;
        replace_file(&path, &encode_records(&events)?)?;
        Ok(outcome)
    }
}

/// Decodes newline-delimited records, keeping those `keep` accepts.
fn read_records<R: BufRead>(
    path: &Path,
    mut reader: R,
    mut keep: impl FnMut(&Event) -> bool,
) -> StoreResult<Vec<Event>> {
    let mut events = Vec::new();
    let mut line = Vec::new();
    let mut number = 0usize;

    loop {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .map_err(|err| StoreError::io(Some(path.to_path_buf()), "read shard", err))?;
        if read == 0 {
            break;
        }
        number += 1;

        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        match serde_json::from_slice::<Event>(&line) {
            Ok(event) => {
                if keep(&event) {
                    events.push(event);
                }
            }
            // only the last line can lack its newline
            Err(err) if line.last() != Some(&b'\n') => {
                warn!(
                    shard = %path.display(),
                    line = number,
                    error = %err,
                    "ignoring unterminated trailing record"
                );
            }
            Err(err) => return Err(StoreError::decode(path, Some(number), err)),
        }
    }

    Ok(events)
}

fn encode_records(events: &[Event]) -> StoreResult<Vec<u8>> {
    let mut buffer = Vec::new();
    for event in events {
        buffer.extend(json::to_line(event, "event")?);
    }
    Ok(buffer)
}

/// `shard` must be the month encoded in the event's id, or point lookups
/// would search the wrong file.
fn ensure_filed_by_id(event: &Event, shard: ShardKey) -> StoreResult<()> {
    let by_id = ShardKey::for_time(&event.id.timestamp());
    if by_id == shard {
        return Ok(());
    }
    Err(StoreError::ShardMismatch {
        id: event.id.to_string(),
        timestamp: event.timestamp.to_rfc3339(),
        shard: by_id.to_string(),
    })
}

/// Makes sure the next record starts on a fresh line. A complete record
/// that only lost its newline is kept by returning the missing `\n` as a
/// prefix for the write; an undecodable fragment is truncated away.
///
/// Caller holds the shard's exclusive lock.
fn repair_tail(file: &mut File, path: &Path) -> StoreResult<Vec<u8>> {
    let io_err =
        |err: std::io::Error| StoreError::io(Some(path.to_path_buf()), "inspect shard tail", err);

    let len = file.metadata().map_err(io_err)?.len();
    if len == 0 {
        return Ok(Vec::new());
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1)).map_err(io_err)?;
    file.read_exact(&mut last).map_err(io_err)?;
    if last[0] == b'\n' {
        return Ok(Vec::new());
    }

    let mut content = Vec::with_capacity(len as usize);
    file.seek(SeekFrom::Start(0)).map_err(io_err)?;
    file.read_to_end(&mut content).map_err(io_err)?;

    let keep_len = content
        .iter()
        .rposition(|byte| *byte == b'\n')
        .map(|pos| pos + 1)
        .unwrap_or(0);
    let tail = &content[keep_len..];

    if serde_json::from_slice::<Event>(tail).is_ok() {
        debug!(shard = %path.display(), "terminating trailing record");
        return Ok(vec![b'\n']);
    }

    warn!(
        shard = %path.display(),
        bytes = tail.len(),
        "truncating torn trailing record"
    );
    file.set_len(keep_len as u64).map_err(io_err)?;
    file.sync_data().map_err(io_err)?;
    Ok(Vec::new())
}
