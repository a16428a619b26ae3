//! Immutable in-memory event snapshots.
//!
//! # Responsibility
//! - Materialize the store once and serve request reads from memory.
//! - Swap in refreshed data without mutating a snapshot in use.
//!
//! # Invariants
//! - A snapshot never changes after construction.
//! - Readers holding an `Arc<EventSnapshot>` keep a consistent view across a
//!   concurrent `SnapshotCell::replace`.

use crate::model::event::TimelineEvent;
use crate::repo::event_repo::{EventStore, StoreError, StoreResult};
use log::info;
use std::sync::{Arc, RwLock};

/// Sorted, read-only copy of every event.
///
/// A snapshot built with [`EventSnapshot::unavailable`] answers every read
/// with [`StoreError::Unavailable`] until a refresh replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSnapshot {
    events: Vec<TimelineEvent>,
    unavailable: Option<String>,
}

impl EventSnapshot {
    /// Builds a snapshot, sorting events chronologically.
    pub fn from_events(mut events: Vec<TimelineEvent>) -> Self {
        events.sort_by(TimelineEvent::chronological_cmp);
        events.dedup();
        Self {
            events,
            unavailable: None,
        }
    }

    /// Placeholder used when the store could not be loaded.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            events: Vec::new(),
            unavailable: Some(reason.into()),
        }
    }

    /// Materializes `store.all()` into a snapshot.
    pub fn load(store: &dyn EventStore) -> StoreResult<Self> {
        let snapshot = Self::from_events(store.all()?);
        info!(
            "event=snapshot_load module=repo status=ok count={}",
            snapshot.len()
        );
        Ok(snapshot)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    fn select(&self, predicate: impl Fn(&TimelineEvent) -> bool) -> StoreResult<Vec<TimelineEvent>> {
        if let Some(reason) = &self.unavailable {
            return Err(StoreError::Unavailable(reason.clone()));
        }
        Ok(self
            .events
            .iter()
            .filter(|event| predicate(event))
            .cloned()
            .collect())
    }
}

impl EventStore for EventSnapshot {
    fn by_date(&self, month: u32, day: u32) -> StoreResult<Vec<TimelineEvent>> {
        self.select(|event| event.month == month && event.day == day)
    }

    fn by_year_range(&self, start: i32, end: i32) -> StoreResult<Vec<TimelineEvent>> {
        self.select(|event| (start..=end).contains(&event.year))
    }

    fn all(&self) -> StoreResult<Vec<TimelineEvent>> {
        self.select(|_| true)
    }
}

/// Holder that publishes the current snapshot to request handlers.
#[derive(Debug, Default)]
pub struct SnapshotCell {
    current: RwLock<Arc<EventSnapshot>>,
}

impl SnapshotCell {
    pub fn new(snapshot: EventSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Returns the snapshot to use for one request.
    pub fn current(&self) -> Arc<EventSnapshot> {
        let guard = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&*guard)
    }

    /// Publishes `snapshot` and returns the previous one.
    pub fn replace(&self, snapshot: EventSnapshot) -> Arc<EventSnapshot> {
        let next = Arc::new(snapshot);
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = std::mem::replace(&mut *guard, next);
        info!(
            "event=snapshot_swap module=repo status=ok previous_count={} count={}",
            previous.len(),
            guard.len()
        );
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::{EventSnapshot, SnapshotCell};
    use crate::model::event::TimelineEvent;
    use crate::repo::event_repo::{EventStore, StoreError};

    fn sample() -> Vec<TimelineEvent> {
        vec![
            TimelineEvent::new(2001, 5, 1, "b", ["web"]),
            TimelineEvent::new(1990, 5, 1, "a", ["dsns"]),
            TimelineEvent::new(1995, 7, 7, "c", Vec::<String>::new()),
        ]
    }

    #[test]
    fn snapshot_sorts_events_chronologically() {
        let snapshot = EventSnapshot::from_events(sample());
        let years: Vec<_> = snapshot.events().iter().map(|event| event.year).collect();
        assert_eq!(years, vec![1990, 1995, 2001]);
    }

    #[test]
    fn by_date_and_range_filter_in_memory() {
        let snapshot = EventSnapshot::from_events(sample());
        assert_eq!(snapshot.by_date(5, 1).unwrap().len(), 2);
        assert_eq!(snapshot.by_year_range(1990, 1999).unwrap().len(), 2);
    }

    #[test]
    fn replace_keeps_previous_snapshot_alive_for_readers() {
        let cell = SnapshotCell::new(EventSnapshot::from_events(sample()));
        let in_flight = cell.current();
        cell.replace(EventSnapshot::default());
        assert_eq!(in_flight.len(), 3);
        assert!(cell.current().is_empty());
    }

    #[test]
    fn unavailable_snapshot_fails_every_read() {
        let snapshot = EventSnapshot::unavailable("database is locked");
        assert!(matches!(snapshot.all(), Err(StoreError::Unavailable(reason)) if reason == "database is locked"));
        assert!(matches!(snapshot.by_date(5, 1), Err(StoreError::Unavailable(_))));
        assert!(matches!(snapshot.by_year_range(1990, 1999), Err(StoreError::Unavailable(_))));
    }
}
