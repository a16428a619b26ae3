//! Timeline event domain model.
//!
//! # Responsibility
//! - Define the dated historical event record and its validation rules.
//! - Own category tag normalization shared by parser, storage and index.
//!
//! # Invariants
//! - `(month, day)` is valid for the leap reference year, so Feb 29 is kept.
//! - `content` is never blank.
//! - Every tag in `categories` satisfies [`normalize_category`].

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Leap year used to validate month/day pairs independent of the event year.
pub const REFERENCE_LEAP_YEAR: i32 = 2000;

/// Dated historical event ("on this day" entry).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    /// Plain text body; may contain line breaks from the source page.
    pub content: String,
    /// Normalized tags; empty for uncategorized events.
    #[serde(default)]
    pub categories: BTreeSet<String>,
}

/// Validation error for event invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventValidationError {
    InvalidDate { month: u32, day: u32 },
    EmptyContent,
    InvalidCategory(String),
}

impl Display for EventValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDate { month, day } => {
                write!(f, "invalid calendar date: month={month} day={day}")
            }
            Self::EmptyContent => write!(f, "event content must not be blank"),
            Self::InvalidCategory(value) => write!(f, "invalid category tag `{value}`"),
        }
    }
}

impl Error for EventValidationError {}

impl TimelineEvent {
    /// Creates an event, normalizing the provided category tags.
    ///
    /// Tags that normalize to nothing are dropped; call [`Self::validate`] to
    /// check date and content.
    pub fn new<I, S>(year: i32, month: u32, day: u32, content: impl Into<String>, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            year,
            month,
            day,
            content: content.into(),
            categories: categories
                .into_iter()
                .filter_map(|tag| normalize_category(tag.as_ref()))
                .collect(),
        }
    }

    /// Validates date, content and category invariants.
    pub fn validate(&self) -> Result<(), EventValidationError> {
        if !is_valid_month_day(self.month, self.day) {
            return Err(EventValidationError::InvalidDate {
                month: self.month,
                day: self.day,
            });
        }
        if self.content.trim().is_empty() {
            return Err(EventValidationError::EmptyContent);
        }
        for tag in &self.categories {
            if normalize_category(tag).as_deref() != Some(tag.as_str()) {
                return Err(EventValidationError::InvalidCategory(tag.clone()));
            }
        }
        Ok(())
    }

    /// Returns whether the event carries the given (normalized) tag.
    pub fn has_category(&self, category: &str) -> bool {
        self.categories.contains(category)
    }

    /// Returns `MM月DD日`.
    pub fn date_label(&self) -> String {
        format!("{:02}月{:02}日", self.month, self.day)
    }

    /// Returns `YYYY-MM-DD`.
    pub fn iso_date(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }

    /// Chronological ordering key; content breaks same-day ties.
    pub fn chronological_cmp(&self, other: &Self) -> Ordering {
        (self.year, self.month, self.day, self.content.as_str()).cmp(&(
            other.year,
            other.month,
            other.day,
            other.content.as_str(),
        ))
    }
}

/// Returns the first year of the decade containing `year`.
pub fn decade_start(year: i32) -> i32 {
    year.div_euclid(10) * 10
}

/// Formats a decade label such as `1990s`.
pub fn decade_label(year: i32) -> String {
    format!("{}s", decade_start(year))
}

/// Returns whether `(month, day)` exists in the leap reference year.
pub fn is_valid_month_day(month: u32, day: u32) -> bool {
    chrono::NaiveDate::from_ymd_opt(REFERENCE_LEAP_YEAR, month, day).is_some()
}

/// Normalizes one category tag.
///
/// Returns `None` for blank input or values that cannot be a tag (inner
/// whitespace or expression operators).
pub fn normalize_category(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.contains(char::is_whitespace)
        || trimmed.contains(['+', '-'])
    {
        return None;
    }
    Some(trimmed.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::{decade_label, is_valid_month_day, normalize_category, TimelineEvent};

    #[test]
    fn new_normalizes_and_drops_invalid_tags() {
        let event = TimelineEvent::new(1990, 5, 1, "x", ["DSNS", " tech ", "", "a-b"]);
        let tags: Vec<_> = event.categories.iter().cloned().collect();
        assert_eq!(tags, vec!["dsns".to_string(), "tech".to_string()]);
    }

    #[test]
    fn leap_day_is_a_valid_month_day() {
        assert!(is_valid_month_day(2, 29));
        assert!(!is_valid_month_day(2, 30));
        assert!(!is_valid_month_day(4, 31));
        assert!(!is_valid_month_day(13, 1));
        assert!(!is_valid_month_day(0, 10));
    }

    #[test]
    fn validate_rejects_blank_content() {
        let event = TimelineEvent::new(2001, 1, 1, "   ", Vec::<String>::new());
        assert!(event.validate().is_err());
    }

    #[test]
    fn decade_label_floors_year() {
        assert_eq!(decade_label(1995), "1990s");
        assert_eq!(decade_label(2000), "2000s");
    }

    #[test]
    fn normalize_category_rejects_operators() {
        assert_eq!(normalize_category("Tech"), Some("tech".to_string()));
        assert_eq!(normalize_category("a+b"), None);
        assert_eq!(normalize_category("a b"), None);
    }
}
