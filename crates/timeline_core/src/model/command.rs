//! Structured command model produced by the parser.
//!
//! # Responsibility
//! - Represent every request the bot understands as one tagged value.
//! - Carry category conditions as parsed include/exclude sets.
//!
//! # Invariants
//! - A command is created per inbound message and never persisted.
//! - `Decade` ranges always satisfy `start_year <= end_year`.

use crate::model::event::TimelineEvent;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// Include/exclude tag sets derived from a category expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryFilter {
    pub include: BTreeSet<String>,
    pub exclude: BTreeSet<String>,
}

impl CategoryFilter {
    /// Builds a filter from already-normalized tags.
    pub fn new<I, E, S, T>(include: I, exclude: E) -> Self
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            include: include.into_iter().map(Into::into).collect(),
            exclude: exclude.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns `true` when neither set has entries (matches everything).
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// `include ⊆ categories` and `exclude ∩ categories = ∅`.
    pub fn matches(&self, event: &TimelineEvent) -> bool {
        self.include.is_subset(&event.categories)
            && self.exclude.is_disjoint(&event.categories)
    }

    /// Returns whether `category` is named by either side of the filter.
    pub fn mentions(&self, category: &str) -> bool {
        self.include.contains(category) || self.exclude.contains(category)
    }
}

impl Display for CategoryFilter {
    /// Renders the canonical expression form, e.g. `dsns+tech-meme`.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let include = self.include.iter().cloned().collect::<Vec<_>>().join("+");
        write!(f, "{include}")?;
        for tag in &self.exclude {
            write!(f, "-{tag}")?;
        }
        Ok(())
    }
}

/// Status report variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Basic,
    Server,
    Bot,
    Timeline,
}

/// Decade report variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecadeKind {
    /// Counts, averages and per-year distribution.
    Statistics,
    /// A few notable events per decade.
    Representative,
    /// Prepared prose summary.
    Summary,
}

/// Parsed, typed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuredCommand {
    Today,
    DateQuery {
        month: u32,
        day: u32,
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
    /// Co-occurrence analysis; the single-category form is `include={cat}`.
    CategoryAnalysis(CategoryFilter),
}

impl StructuredCommand {
    /// Stable short name used in logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::DateQuery { .. } => "date",
            Self::Search { .. } => "search",
            Self::Help => "help",
            Self::Status(_) => "status",
            Self::Decade { .. } => "decade",
            Self::CategoryList => "category_list",
            Self::CategoryStats => "category_stats",
            Self::CategoryAnalysis(_) => "category_analysis",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CategoryFilter;
    use crate::model::event::TimelineEvent;

    #[test]
    fn empty_include_matches_everything_except_excluded() {
        let filter = CategoryFilter::new(Vec::<String>::new(), ["meme"]);
        let plain = TimelineEvent::new(1999, 1, 1, "plain", Vec::<String>::new());
        let meme = TimelineEvent::new(1999, 1, 1, "meme", ["meme"]);
        assert!(filter.matches(&plain));
        assert!(!filter.matches(&meme));
    }

    #[test]
    fn include_requires_every_tag() {
        let filter = CategoryFilter::new(["dsns", "tech"], Vec::<String>::new());
        let both = TimelineEvent::new(2005, 3, 3, "both", ["dsns", "tech", "web"]);
        let one = TimelineEvent::new(2005, 3, 3, "one", ["dsns"]);
        assert!(filter.matches(&both));
        assert!(!filter.matches(&one));
    }

    #[test]
    fn display_renders_expression_form() {
        let filter = CategoryFilter::new(["tech", "dsns"], ["meme"]);
        assert_eq!(filter.to_string(), "dsns+tech-meme");
    }
}
