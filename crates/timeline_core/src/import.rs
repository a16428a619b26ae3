//! JSON import and export of timeline events.
//!
//! # Responsibility
//! - Load `{"events": [...]}` documents into the SQLite store.
//! - Record every import attempt in the update history.
//! - Dump the whole store in the same document shape.
//!
//! # Invariants
//! - An import is all-or-nothing; a rejected batch writes no events.
//! - Category tags are normalized on the way in; a tag that cannot be
//!   normalized fails the batch instead of being dropped.

use crate::model::event::{normalize_category, TimelineEvent};
use crate::repo::event_repo::{EventStore, ImportOutcome, SqliteEventRepository, StoreError};
use crate::repo::history_repo::{record_update, NewUpdateRecord};
use log::{info, warn};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub type ImportResult<T> = Result<T, ImportError>;

#[derive(Debug)]
pub enum ImportError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Json(serde_json::Error),
    Store(StoreError),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot access `{}`: {source}", path.display()),
            Self::Json(err) => write!(f, "malformed event document: {err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<StoreError> for ImportError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

#[derive(Debug, Deserialize)]
struct ImportDocument {
    events: Vec<ImportedEvent>,
}

#[derive(Debug, Deserialize)]
struct ImportedEvent {
    year: i32,
    month: u32,
    day: u32,
    content: String,
    #[serde(default, alias = "tags")]
    categories: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ExportDocument<'a> {
    events: &'a [TimelineEvent],
}

/// Counts for one successful import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub outcome: ImportOutcome,
    /// Store size after the import.
    pub total: usize,
}

/// Parses an event document.
///
/// Tags are normalized; tags that do not normalize are kept as written so
/// validation rejects the batch at import time.
pub fn parse_events(json: &str) -> ImportResult<Vec<TimelineEvent>> {
    let document: ImportDocument = serde_json::from_str(json)?;
    Ok(document.events.into_iter().map(ImportedEvent::into_event).collect())
}

impl ImportedEvent {
    fn into_event(self) -> TimelineEvent {
        TimelineEvent {
            year: self.year,
            month: self.month,
            day: self.day,
            content: self.content,
            categories: self
                .categories
                .into_iter()
                .map(|tag| normalize_category(&tag).unwrap_or(tag))
                .collect(),
        }
    }
}

/// Upserts `events` and appends an update history row.
///
/// A failed batch is also recorded, with status `failed`.
pub fn import_events(
    conn: &Connection,
    events: &[TimelineEvent],
    source: Option<&str>,
) -> ImportResult<ImportReport> {
    let repo = SqliteEventRepository::new(conn);
    match repo.insert_events(events) {
        Ok(outcome) => {
            let total = repo.count()?;
            record_update(
                conn,
                &NewUpdateRecord {
                    events_added: outcome.added,
                    events_updated: outcome.updated,
                    events_total: total,
                    source,
                    status: "success",
                    notes: None,
                },
            )?;
            info!(
                "event=data_import module=import status=ok added={} updated={} total={}",
                outcome.added, outcome.updated, total
            );
            Ok(ImportReport { outcome, total })
        }
        Err(err) => {
            let notes = err.to_string();
            let total = repo.count()?;
            record_update(
                conn,
                &NewUpdateRecord {
                    events_added: 0,
                    events_updated: 0,
                    events_total: total,
                    source,
                    status: "failed",
                    notes: Some(&notes),
                },
            )?;
            warn!(
                "event=data_import module=import status=error batch={} error={}",
                events.len(),
                err
            );
            Err(err.into())
        }
    }
}

/// Reads `path` and imports its events.
pub fn import_file(conn: &Connection, path: &Path) -> ImportResult<ImportReport> {
    let json = std::fs::read_to_string(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let events = parse_events(&json)?;
    let source = path.display().to_string();
    import_events(conn, &events, Some(&source))
}

/// Serializes every event in chronological order.
pub fn export_events(store: &dyn EventStore) -> ImportResult<String> {
    let mut events = store.all()?;
    events.sort_by(TimelineEvent::chronological_cmp);
    Ok(serde_json::to_string_pretty(&ExportDocument { events: &events })?)
}

/// Writes [`export_events`] output to `path`; returns the event count.
pub fn export_file(store: &dyn EventStore, path: &Path) -> ImportResult<usize> {
    let json = export_events(store)?;
    let count = store.all()?.len();
    std::fs::write(path, json).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!("event=data_export module=import status=ok count={count}");
    Ok(count)
}
