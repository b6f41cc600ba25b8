//! # Store Error Types
//!
//! Every fallible operation of the store returns [`StoreError`]. Each variant
//! maps to one failure mode and carries the file or identifier involved so
//! the command layer can report it without re-deriving context.
//!
//! ## Error Categories
//!
//! - **Contention**: a shard is held by another process (`LockUnavailable`)
//! - **Lookup**: the targeted record does not exist (`NotFound`)
//! - **Data**: a record or dictionary file cannot be decoded or encoded
//! - **Integrity**: a record would break the id/shard relationship
//! - **System**: filesystem failures (`Io`)
//!
//! The store never retries on its own; retry policy belongs to the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for all store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure modes of the event log, dictionary store and lock manager.
#[derive(Debug, Error)]
pub enum StoreError {
    /// E_LOCK_UNAVAILABLE - Shard is locked by another reader or writer
    ///
    /// Only `append` reports this: it refuses to wait so that event capture
    /// never hangs.
    #[error("File is locked by another process: {}", path.display())]
    LockUnavailable {
        /// Data file whose lock could not be taken
        path: PathBuf,
    },

    /// E_NOT_FOUND - No record carries the requested id
    #[error("Event not found: {id}")]
    NotFound {
        /// Identifier that was looked up
        id: String,
    },

    /// E_DECODE - A shard record or dictionary file is malformed
    ///
    /// The file stays unusable for the failing operation until it is repaired
    /// by hand; other shards and namespaces are unaffected.
    #[error("Failed to decode {}{}: {source}", path.display(), line_suffix(line))]
    Decode {
        /// File that failed to decode
        path: PathBuf,
        /// 1-based line number for shard records
        line: Option<usize>,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// E_ENCODE - A value could not be serialised
    #[error("Failed to encode {what}: {source}")]
    Encode {
        /// What was being encoded
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// E_INVALID_ID - String is not a well-formed event id
    #[error("Invalid event ID '{id}': {reason}")]
    InvalidEventId { id: String, reason: String },

    /// E_ID_REASSIGNED - An update mutator changed the record id
    #[error("Event {id} cannot change its id during an update")]
    IdReassigned { id: String },

    /// E_SHARD_MISMATCH - Timestamp and id resolve to different shards
    ///
    /// Point operations find a record through the month encoded in its id,
    /// so a record filed under any other month could never be found again.
    #[error("Event {id} is stamped {timestamp}, outside shard {shard} named by its id")]
    ShardMismatch {
        id: String,
        timestamp: String,
        /// Shard the id resolves to
        shard: String,
    },

    /// E_IO - Filesystem operation failed
    #[error("I/O error in {operation}: {source}")]
    Io {
        /// Operation that was being performed
        operation: String,
        /// Path involved in the operation (if applicable)
        path: Option<PathBuf>,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

fn line_suffix(line: &Option<usize>) -> String {
    match line {
        Some(line) => format!(" (line {line})"),
        None => String::new(),
    }
}

impl StoreError {
    /// Builds an I/O error with an optional path and an operation name.
    pub fn io<P, S>(path: P, operation: S, source: std::io::Error) -> Self
    where
        P: Into<Option<PathBuf>>,
        S: Into<String>,
    {
        Self::Io {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    pub(crate) fn decode<P: Into<PathBuf>>(
        path: P,
        line: Option<usize>,
        source: serde_json::Error,
    ) -> Self {
        Self::Decode {
            path: path.into(),
            line,
            source,
        }
    }

    /// Returns the stable error code for this variant.
    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::LockUnavailable { .. } => "E_LOCK_UNAVAILABLE",
            StoreError::NotFound { .. } => "E_NOT_FOUND",
            StoreError::Decode { .. } => "E_DECODE",
            StoreError::Encode { .. } => "E_ENCODE",
            StoreError::InvalidEventId { .. } => "E_INVALID_ID",
            StoreError::IdReassigned { .. } => "E_ID_REASSIGNED",
            StoreError::ShardMismatch { .. } => "E_SHARD_MISMATCH",
            StoreError::Io { .. } => "E_IO",
        }
    }

    /// Whether the caller can reasonably try again or move on.
    ///
    /// A busy shard clears once the other process finishes; a missing record
    /// is a normal answer. Everything else needs intervention.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StoreError::LockUnavailable { .. } | StoreError::NotFound { .. }
        )
    }
}
