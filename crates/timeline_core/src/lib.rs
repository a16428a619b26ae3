//! Core logic for the "on this day" timeline bot.
//! This crate owns parsing, storage, evaluation and reply formatting.

pub mod config;
pub mod db;
pub mod import;
pub mod index;
pub mod logging;
pub mod model;
pub mod parser;
pub mod repo;
pub mod service;
pub mod summary;

pub use config::{BotConfig, ConfigError, ConfigResult};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use import::{export_file, import_file, ImportError, ImportReport, ImportResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::command::{CategoryFilter, DecadeKind, StatusKind, StructuredCommand};
pub use model::event::{EventValidationError, TimelineEvent};
pub use model::message::{InboundMessage, Visibility};
pub use model::result::{QueryKind, ResultItem, ResultSet, StatRecord};
pub use parser::parse;
pub use repo::event_repo::{EventStore, SqliteEventRepository, StoreError, StoreResult};
pub use repo::snapshot::{EventSnapshot, SnapshotCell};
pub use service::dispatcher::{
    BotContext, DispatchOutcome, Dispatcher, IgnoreReason, MessageSender, SendError,
};
pub use service::evaluator::{evaluate, EvalContext, EvalError, EvalResult};
pub use service::formatter::{format, format_failure, format_with_link, MessageLimits};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
