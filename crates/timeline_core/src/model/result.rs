//! Evaluated query results handed to the formatter.
//!
//! # Invariants
//! - `ResultSet::truncated` is `items.len() < total_count`.
//! - Items are already in presentation order; the formatter never reorders.

use crate::model::command::{CategoryFilter, DecadeKind, StatusKind};
use crate::model::event::TimelineEvent;
use std::collections::BTreeMap;

/// What was asked, kept so headers and empty messages can be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    Date {
        month: u32,
        day: u32,
        /// Set when the date came from the `Today` command or a scheduled post.
        is_today: bool,
    },
    Search {
        keyword: String,
        filter: Option<CategoryFilter>,
    },
    Help,
    Status(StatusKind),
    Decade {
        start_year: i32,
        end_year: i32,
        kind: DecadeKind,
        filter: Option<CategoryFilter>,
    },
    CategoryList,
    CategoryStats,
    CategoryAnalysis(CategoryFilter),
}

/// Derived statistics for one year range.
#[derive(Debug, Clone, PartialEq)]
pub struct DecadeStatistics {
    /// Display name, e.g. `1990年代`.
    pub decade: String,
    pub start_year: i32,
    pub end_year: i32,
    pub total_events: usize,
    pub average_per_year: f64,
    /// `(year, count)` with the most events; earliest year on ties.
    pub max_year: (i32, usize),
    /// `(year, count)` with the fewest events among years that have any.
    pub min_year: (i32, usize),
    /// Every year in range, zero counts included.
    pub year_distribution: BTreeMap<i32, usize>,
}

/// Non-event result entry.
#[derive(Debug, Clone, PartialEq)]
pub enum StatRecord {
    /// Prepared text line (help, status, summaries).
    Line(String),
    CategoryCount {
        category: String,
        count: usize,
    },
    CategoryTotals {
        categories: usize,
        events_with_categories: usize,
    },
    DecadeTopCategories {
        decade: String,
        top: Vec<(String, usize)>,
    },
    Decade(DecadeStatistics),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultItem {
    Event(TimelineEvent),
    Stat(StatRecord),
}

/// Evaluator output.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub query: QueryKind,
    pub items: Vec<ResultItem>,
    /// Number of matches before presentation caps.
    pub total_count: usize,
    pub truncated: bool,
}

impl ResultSet {
    /// Result where every match is presented.
    pub fn complete(query: QueryKind, items: Vec<ResultItem>) -> Self {
        let total_count = items.len();
        Self {
            query,
            items,
            total_count,
            truncated: false,
        }
    }

    /// Result whose items were capped from `total_count` matches.
    pub fn capped(query: QueryKind, items: Vec<ResultItem>, total_count: usize) -> Self {
        let total_count = total_count.max(items.len());
        let truncated = items.len() < total_count;
        Self {
            query,
            items,
            total_count,
            truncated,
        }
    }

    pub fn empty(query: QueryKind) -> Self {
        Self::complete(query, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Event items in presentation order.
    pub fn events(&self) -> impl Iterator<Item = &TimelineEvent> {
        self.items.iter().filter_map(|item| match item {
            ResultItem::Event(event) => Some(event),
            ResultItem::Stat(_) => None,
        })
    }
}
