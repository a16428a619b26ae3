//! Data update history persistence.
//!
//! Each import run appends one row; status reports read the latest.

use crate::repo::event_repo::{StoreError, StoreResult};
use rusqlite::{params, Connection, Row};

/// One recorded data update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRecord {
    /// Epoch milliseconds.
    pub updated_at: i64,
    pub events_added: usize,
    pub events_updated: usize,
    pub events_total: usize,
    pub source: Option<String>,
    pub status: String,
    pub notes: Option<String>,
}

/// Input for [`record_update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUpdateRecord<'a> {
    pub events_added: usize,
    pub events_updated: usize,
    pub events_total: usize,
    pub source: Option<&'a str>,
    pub status: &'a str,
    pub notes: Option<&'a str>,
}

/// Appends one update history row.
pub fn record_update(conn: &Connection, record: &NewUpdateRecord<'_>) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO update_history (
            events_added,
            events_updated,
            events_total,
            source,
            status,
            notes
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        params![
            to_db_count(record.events_added)?,
            to_db_count(record.events_updated)?,
            to_db_count(record.events_total)?,
            record.source,
            record.status,
            record.notes,
        ],
    )?;
    Ok(())
}

/// Returns the most recent update, if any.
pub fn last_update(conn: &Connection) -> StoreResult<Option<UpdateRecord>> {
    let mut stmt = conn.prepare(
        "SELECT updated_at, events_added, events_updated, events_total, source, status, notes
         FROM update_history
         ORDER BY updated_at DESC, id DESC
         LIMIT 1;",
    )?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => Ok(Some(parse_update_row(row)?)),
        None => Ok(None),
    }
}

fn parse_update_row(row: &Row<'_>) -> StoreResult<UpdateRecord> {
    Ok(UpdateRecord {
        updated_at: row.get("updated_at")?,
        events_added: from_db_count(row.get("events_added")?)?,
        events_updated: from_db_count(row.get("events_updated")?)?,
        events_total: from_db_count(row.get("events_total")?)?,
        source: row.get("source")?,
        status: row.get("status")?,
        notes: row.get("notes")?,
    })
}

fn to_db_count(value: usize) -> StoreResult<i64> {
    i64::try_from(value).map_err(|_| StoreError::InvalidData(format!("count {value} too large")))
}

fn from_db_count(value: i64) -> StoreResult<usize> {
    usize::try_from(value)
        .map_err(|_| StoreError::InvalidData(format!("invalid count `{value}` in update_history")))
}
