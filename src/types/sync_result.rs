//! Outcome types returned by a history sync. Nothing here is persisted.

use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

/// Category of a problem folded into [`SyncResult::errors`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncErrorKind {
    /// Network, HTTP or decoding failure talking to the archive. Aborts the current sync only.
    RemoteFetch,
    /// The history file could not be read, written or repaired.
    Storage,
    /// The history file header did not match the expected columns; the file was rebuilt.
    SchemaMismatch,
    /// A single row or fetched entry was dropped.
    MalformedRecord,
}

impl fmt::Display for SyncErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncErrorKind::RemoteFetch => "remote fetch error",
            SyncErrorKind::Storage => "storage error",
            SyncErrorKind::SchemaMismatch => "schema mismatch",
            SyncErrorKind::MalformedRecord => "malformed record",
        };
        f.write_str(name)
    }
}

/// A recovered error, reduced to its kind and rendered message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct SyncError {
    pub kind: SyncErrorKind,
    pub message: String,
}

impl SyncError {
    pub fn new(kind: SyncErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Builds a `SyncError` from any error, keeping its full source chain in the message.
    pub(crate) fn from_error(kind: SyncErrorKind, error: &dyn std::error::Error) -> Self {
        let mut message = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self { kind, message }
    }
}

/// Summary of one sync call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncResult {
    /// Records appended to the store.
    pub added_count: usize,
    /// Fetched records whose date was already stored.
    pub skipped_existing_count: usize,
    /// Records in the store after the sync, re-read from disk.
    pub final_record_count: usize,
    /// Fetched entries dropped for missing or non-numeric fields.
    pub malformed_count: usize,
    /// Rows cut from the end of the file by repair.
    pub repaired_discarded_count: usize,
    /// The inclusive range requested from the archive, if a fetch happened.
    pub fetched_range: Option<(NaiveDate, NaiveDate)>,
    pub errors: Vec<SyncError>,
}

impl SyncResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors_of(&self, kind: SyncErrorKind) -> impl Iterator<Item = &SyncError> {
        self.errors.iter().filter(move |e| e.kind == kind)
    }

    /// One-line description for display, e.g. `"added 3 new days; 0 errors"`.
    pub fn summary(&self) -> String {
        format!(
            "added {} new day{}; {} error{}",
            self.added_count,
            if self.added_count == 1 { "" } else { "s" },
            self.errors.len(),
            if self.errors.len() == 1 { "" } else { "s" },
        )
    }
}

/// Phases of a sync call. Each phase is entered at most once, in declaration order, and
/// every call ends in `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SyncState {
    Idle,
    DeterminingGap,
    NoGapFetchNeeded,
    FetchingRemote,
    Merging,
    Repairing,
    Done,
}
