//! Event store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide date, year-range and full reads over the `events` table.
//! - Own the import path that upserts events and replaces their tag links.
//!
//! # Invariants
//! - Read paths reject invalid persisted rows instead of masking them.
//! - An import replaces an event's whole category set atomically.

use crate::db::DbError;
use crate::model::event::{EventValidationError, TimelineEvent};
use log::{debug, info};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction};
use std::error::Error;
use std::fmt::{Display, Formatter};

const EVENT_SELECT_SQL: &str = "SELECT
    e.id AS id,
    e.year AS year,
    e.month AS month,
    e.day AS day,
    e.content AS content,
    COALESCE(GROUP_CONCAT(c.name, ' '), '') AS categories
FROM events e
LEFT JOIN event_categories ec ON ec.event_id = e.id
LEFT JOIN categories c ON c.id = ec.category_id";

const EVENT_ORDER_SQL: &str = " GROUP BY e.id ORDER BY e.year ASC, e.month ASC, e.day ASC, e.content ASC";

pub type StoreResult<T> = Result<T, StoreError>;

/// Error for event store reads and imports.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    Validation(EventValidationError),
    InvalidData(String),
    /// Backing store cannot serve reads right now.
    Unavailable(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted event data: {message}"),
            Self::Unavailable(message) => write!(f, "event store unavailable: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::InvalidData(_) | Self::Unavailable(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<EventValidationError> for StoreError {
    fn from(value: EventValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Read contract consumed by the query evaluator.
pub trait EventStore {
    /// Events on `(month, day)` of any year.
    fn by_date(&self, month: u32, day: u32) -> StoreResult<Vec<TimelineEvent>>;
    /// Events with `start <= year <= end`.
    fn by_year_range(&self, start: i32, end: i32) -> StoreResult<Vec<TimelineEvent>>;
    /// Every event; the store is small enough to materialize.
    fn all(&self) -> StoreResult<Vec<TimelineEvent>>;
}

/// Counts reported by one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub added: usize,
    pub updated: usize,
}

/// SQLite-backed event store.
pub struct SqliteEventRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEventRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Upserts events keyed by `(year, month, day, content)`.
    ///
    /// Existing events keep their row and get their category set replaced.
    /// The whole batch is rejected when any event fails validation.
    pub fn insert_events(&self, events: &[TimelineEvent]) -> StoreResult<ImportOutcome> {
        for event in events {
            event.validate()?;
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut outcome = ImportOutcome::default();
        for event in events {
            match find_event_id(&tx, event)? {
                Some(event_id) => {
                    tx.execute(
                        "UPDATE events
                         SET updated_at = (strftime('%s', 'now') * 1000)
                         WHERE id = ?1;",
                        [event_id],
                    )?;
                    replace_categories(&tx, event_id, event)?;
                    outcome.updated += 1;
                }
                None => {
                    tx.execute(
                        "INSERT INTO events (year, month, day, content)
                         VALUES (?1, ?2, ?3, ?4);",
                        params![event.year, event.month, event.day, event.content.as_str()],
                    )?;
                    let event_id = tx.last_insert_rowid();
                    replace_categories(&tx, event_id, event)?;
                    outcome.added += 1;
                }
            }
        }
        tx.commit()?;

        info!(
            "event=events_import module=repo status=ok added={} updated={}",
            outcome.added, outcome.updated
        );
        Ok(outcome)
    }

    /// Total number of stored events.
    pub fn count(&self) -> StoreResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events;", [], |row| row.get(0))?;
        usize::try_from(count)
            .map_err(|_| StoreError::InvalidData(format!("negative event count {count}")))
    }

    fn query_events(&self, where_sql: &str, bind_values: Vec<Value>) -> StoreResult<Vec<TimelineEvent>> {
        let sql = format!("{EVENT_SELECT_SQL}{where_sql}{EVENT_ORDER_SQL};");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_event_row(row)?);
        }
        Ok(events)
    }
}

impl EventStore for SqliteEventRepository<'_> {
    fn by_date(&self, month: u32, day: u32) -> StoreResult<Vec<TimelineEvent>> {
        let events = self.query_events(
            " WHERE e.month = ? AND e.day = ?",
            vec![Value::Integer(i64::from(month)), Value::Integer(i64::from(day))],
        )?;
        debug!(
            "event=store_read module=repo status=ok query=by_date month={} day={} count={}",
            month,
            day,
            events.len()
        );
        Ok(events)
    }

    fn by_year_range(&self, start: i32, end: i32) -> StoreResult<Vec<TimelineEvent>> {
        let events = self.query_events(
            " WHERE e.year BETWEEN ? AND ?",
            vec![Value::Integer(i64::from(start)), Value::Integer(i64::from(end))],
        )?;
        debug!(
            "event=store_read module=repo status=ok query=by_year_range start={} end={} count={}",
            start,
            end,
            events.len()
        );
        Ok(events)
    }

    fn all(&self) -> StoreResult<Vec<TimelineEvent>> {
        self.query_events("", Vec::new())
    }
}

fn parse_event_row(row: &Row<'_>) -> StoreResult<TimelineEvent> {
    let id: i64 = row.get("id")?;
    let month = parse_u32(row.get("month")?, "month", id)?;
    let day = parse_u32(row.get("day")?, "day", id)?;
    let year: i64 = row.get("year")?;
    let year = i32::try_from(year)
        .map_err(|_| StoreError::InvalidData(format!("year `{year}` out of range in events.id={id}")))?;
    let categories: String = row.get("categories")?;

    let event = TimelineEvent::new(
        year,
        month,
        day,
        row.get::<_, String>("content")?,
        categories.split_whitespace(),
    );
    event
        .validate()
        .map_err(|err| StoreError::InvalidData(format!("events.id={id}: {err}")))?;
    Ok(event)
}

fn parse_u32(value: i64, column: &str, id: i64) -> StoreResult<u32> {
    u32::try_from(value).map_err(|_| {
        StoreError::InvalidData(format!("invalid {column} value `{value}` in events.id={id}"))
    })
}

fn find_event_id(tx: &Transaction<'_>, event: &TimelineEvent) -> StoreResult<Option<i64>> {
    let mut stmt = tx.prepare(
        "SELECT id FROM events
         WHERE year = ?1 AND month = ?2 AND day = ?3 AND content = ?4;",
    )?;
    let mut rows = stmt.query(params![
        event.year,
        event.month,
        event.day,
        event.content.as_str()
    ])?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

fn replace_categories(tx: &Transaction<'_>, event_id: i64, event: &TimelineEvent) -> StoreResult<()> {
    tx.execute("DELETE FROM event_categories WHERE event_id = ?1;", [event_id])?;
    for category in &event.categories {
        tx.execute(
            "INSERT OR IGNORE INTO categories (name) VALUES (?1);",
            [category.as_str()],
        )?;
        tx.execute(
            "INSERT INTO event_categories (event_id, category_id)
             SELECT ?1, id
             FROM categories
             WHERE name = ?2 COLLATE NOCASE;",
            params![event_id, category.as_str()],
        )?;
    }
    Ok(())
}
