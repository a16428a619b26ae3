//! Query pipeline services.
//!
//! # Responsibility
//! - Evaluate parsed commands against an event snapshot.
//! - Render results within the message budget.
//! - Route inbound notes and scheduled posts to a sender.

pub mod dispatcher;
pub mod evaluator;
pub mod formatter;
pub mod status;
