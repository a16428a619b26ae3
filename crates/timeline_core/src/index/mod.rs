//! Derived category views over the event store.
//!
//! # Responsibility
//! - Compute category membership, distribution and co-occurrence on demand.
//!
//! # Invariants
//! - Indexes are rebuilt per request from one snapshot; nothing is cached.

pub mod category_index;
