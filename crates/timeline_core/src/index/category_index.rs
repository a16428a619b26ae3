//! Category index built from a borrowed slice of events.
//!
//! # Invariants
//! - `members_of(cat)` only returns events from the source slice.
//! - `distribution()[cat] == members_of(cat).len()`.
//! - Co-occurrence rankings never contain the queried categories themselves.
//! - Rankings sort by count descending, then category name ascending.

use crate::model::command::CategoryFilter;
use crate::model::event::{decade_label, TimelineEvent};
use std::collections::{BTreeMap, BTreeSet};

/// `(category, count)` pairs in ranking order.
pub type CategoryRanking = Vec<(String, usize)>;

/// Read-only category view over one set of events.
#[derive(Debug, Clone)]
pub struct CategoryIndex<'a> {
    events: &'a [TimelineEvent],
    members: BTreeMap<&'a str, Vec<usize>>,
}

impl<'a> CategoryIndex<'a> {
    /// Indexes every tag of every event in `events`.
    pub fn build(events: &'a [TimelineEvent]) -> Self {
        let mut members: BTreeMap<&'a str, Vec<usize>> = BTreeMap::new();
        for (position, event) in events.iter().enumerate() {
            for category in &event.categories {
                members.entry(category.as_str()).or_default().push(position);
            }
        }
        Self { events, members }
    }

    /// Events tagged with `category`, in source order.
    pub fn members_of(&self, category: &str) -> Vec<&'a TimelineEvent> {
        self.members
            .get(category)
            .map(|positions| positions.iter().map(|&position| &self.events[position]).collect())
            .unwrap_or_default()
    }

    /// Known category names in ascending order.
    pub fn categories(&self) -> BTreeSet<&'a str> {
        self.members.keys().copied().collect()
    }

    /// Number of events per category.
    pub fn distribution(&self) -> BTreeMap<String, usize> {
        self.members
            .iter()
            .map(|(category, positions)| ((*category).to_string(), positions.len()))
            .collect()
    }

    /// Distribution in ranking order.
    pub fn ranked(&self) -> CategoryRanking {
        rank(self.distribution())
    }

    /// Number of events carrying at least one category.
    pub fn events_with_categories(&self) -> usize {
        self.events
            .iter()
            .filter(|event| !event.categories.is_empty())
            .count()
    }

    /// Categories appearing alongside `category`, excluding itself.
    pub fn co_occurring(&self, category: &str) -> CategoryRanking {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for event in self.members_of(category) {
            for other in event.categories.iter().filter(|other| other.as_str() != category) {
                *counts.entry(other.clone()).or_default() += 1;
            }
        }
        rank(counts)
    }

    /// Categories appearing on events matched by `filter`, excluding every
    /// category the filter names.
    pub fn co_occurring_filtered(&self, filter: &CategoryFilter) -> CategoryRanking {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for event in self.events.iter().filter(|event| filter.matches(event)) {
            for other in event.categories.iter().filter(|other| !filter.mentions(other)) {
                *counts.entry(other.clone()).or_default() += 1;
            }
        }
        rank(counts)
    }

    /// Events per decade label, optionally restricted to one category.
    pub fn decade_distribution(&self, category: Option<&str>) -> BTreeMap<String, usize> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        let selected: Box<dyn Iterator<Item = &TimelineEvent>> = match category {
            Some(category) => Box::new(self.members_of(category).into_iter()),
            None => Box::new(self.events.iter()),
        };
        for event in selected {
            *counts.entry(decade_label(event.year)).or_default() += 1;
        }
        counts
    }

    /// Per decade label, the tag counts of events in that decade.
    pub fn decade_category_counts(&self) -> BTreeMap<String, BTreeMap<String, usize>> {
        let mut decades: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
        for event in self.events.iter().filter(|event| !event.categories.is_empty()) {
            let counts = decades.entry(decade_label(event.year)).or_default();
            for category in &event.categories {
                *counts.entry(category.clone()).or_default() += 1;
            }
        }
        decades
    }
}

/// Sorts counts descending with ties broken by category name.
pub fn rank(counts: BTreeMap<String, usize>) -> CategoryRanking {
    let mut ranked: CategoryRanking = counts.into_iter().collect();
    ranked.sort_by(|left, right| right.1.cmp(&left.1).then_with(|| left.0.cmp(&right.0)));
    ranked
}

#[cfg(test)]
mod tests {
    use super::CategoryIndex;
    use crate::model::command::CategoryFilter;
    use crate::model::event::TimelineEvent;

    fn events() -> Vec<TimelineEvent> {
        vec![
            TimelineEvent::new(1995, 1, 1, "a", ["dsns", "tech"]),
            TimelineEvent::new(1998, 2, 2, "b", ["dsns", "meme"]),
            TimelineEvent::new(2004, 3, 3, "c", ["dsns", "tech", "web"]),
            TimelineEvent::new(2010, 4, 4, "d", Vec::<String>::new()),
        ]
    }

    #[test]
    fn co_occurring_excludes_self_and_ranks_by_count_then_name() {
        let events = events();
        let index = CategoryIndex::build(&events);
        let ranking = index.co_occurring("dsns");
        assert_eq!(
            ranking,
            vec![
                ("tech".to_string(), 2),
                ("meme".to_string(), 1),
                ("web".to_string(), 1),
            ]
        );
    }

    #[test]
    fn distribution_matches_membership() {
        let events = events();
        let index = CategoryIndex::build(&events);
        for (category, count) in index.distribution() {
            assert_eq!(index.members_of(&category).len(), count);
        }
        assert_eq!(index.events_with_categories(), 3);
    }

    #[test]
    fn decade_distribution_uses_floor_labels() {
        let events = events();
        let index = CategoryIndex::build(&events);
        let all = index.decade_distribution(None);
        assert_eq!(all.get("1990s"), Some(&2));
        assert_eq!(all.get("2010s"), Some(&1));
        let tech = index.decade_distribution(Some("tech"));
        assert_eq!(tech.get("2000s"), Some(&1));
        assert_eq!(tech.get("2010s"), None);
    }

    #[test]
    fn co_occurring_filtered_skips_filter_tags() {
        let events = events();
        let index = CategoryIndex::build(&events);
        let filter = CategoryFilter::new(["dsns"], ["meme"]);
        let ranking = index.co_occurring_filtered(&filter);
        assert_eq!(ranking, vec![("tech".to_string(), 2), ("web".to_string(), 1)]);
    }
}
