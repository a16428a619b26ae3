//! Domain model for timeline events and parsed bot commands.
//!
//! # Responsibility
//! - Define the canonical event record shared by storage, index and evaluator.
//! - Define the structured command produced by the parser and the evaluated
//!   result set consumed by the formatter.
//! - Define the inbound note shape handled by the dispatcher.
//!
//! # Invariants
//! - An event is identified by `(year, month, day, content)`.
//! - Category tags are always stored in normalized lowercase form.
//! - Commands never carry raw category expression text, only parsed filters.

pub mod command;
pub mod event;
pub mod message;
pub mod result;
