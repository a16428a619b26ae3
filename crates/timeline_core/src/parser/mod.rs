//! Free-text command parsing.
//!
//! # Responsibility
//! - Turn one mention body into exactly one [`StructuredCommand`].
//! - Keep every recognizer deterministic and table/regex driven.
//!
//! # Invariants
//! - Parsing is total: unknown text becomes a keyword search, blank text help.
//! - Recognizers run in a fixed priority order; the first match wins.
//!
//! [`StructuredCommand`]: crate::model::command::StructuredCommand

pub mod category_expr;
pub mod command;
pub mod date;
pub mod decade;

pub use command::parse;
