//! Event store contracts and persistence implementations.
//!
//! # Responsibility
//! - Define the read contract (`EventStore`) consumed by the evaluator.
//! - Isolate SQLite query details from evaluation and formatting.
//! - Provide immutable in-memory snapshots for request processing.
//!
//! # Invariants
//! - Write paths must call `TimelineEvent::validate()` before SQL mutations.
//! - Every read returns events in `(year, month, day, content)` order.

pub mod event_repo;
pub mod history_repo;
pub mod snapshot;
