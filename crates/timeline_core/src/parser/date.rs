//! Month/day recognition backed by an ordered pattern table.
//!
//! # Invariants
//! - Patterns are tried in table order and the first match decides.
//! - A match whose captures are not a real month/day yields no date; later
//!   patterns are not consulted.

use crate::model::event::is_valid_month_day;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// One entry of the date table.
pub struct DatePattern {
    pub name: &'static str,
    regex: Regex,
    extract: fn(&Captures<'_>) -> Option<(u32, u32)>,
}

impl DatePattern {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            regex: Regex::new(pattern).expect("valid date pattern regex"),
            extract: month_day_groups,
        }
    }
}

/// Table order matters: zero-padded forms come before the loose ones.
pub static DATE_PATTERNS: Lazy<Vec<DatePattern>> = Lazy::new(|| {
    vec![
        DatePattern::new("mm_dd_kanji", r"(?:^|[^0-9])([0-9]{2})月([0-9]{2})日"),
        DatePattern::new("m_d_kanji", r"(?:^|[^0-9])([0-9]{1,2})月([0-9]{1,2})日"),
        DatePattern::new("mm_dd_slash", r"(?:^|[^0-9/])([0-9]{2})/([0-9]{2})(?:[^0-9/]|$)"),
        DatePattern::new("m_d_slash", r"(?:^|[^0-9/])([0-9]{1,2})/([0-9]{1,2})(?:[^0-9/]|$)"),
    ]
});

fn month_day_groups(captures: &Captures<'_>) -> Option<(u32, u32)> {
    let month = captures.get(1)?.as_str().parse().ok()?;
    let day = captures.get(2)?.as_str().parse().ok()?;
    Some((month, day))
}

/// Outcome of scanning text against the date table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateMatch {
    /// No pattern matched.
    None,
    /// A pattern matched but the captures are not a calendar date.
    Invalid { pattern: &'static str },
    Valid {
        pattern: &'static str,
        month: u32,
        day: u32,
    },
}

/// Scans `text` with [`DATE_PATTERNS`].
pub fn match_date(text: &str) -> DateMatch {
    for pattern in DATE_PATTERNS.iter() {
        let Some(captures) = pattern.regex.captures(text) else {
            continue;
        };
        return match (pattern.extract)(&captures) {
            Some((month, day)) if is_valid_month_day(month, day) => DateMatch::Valid {
                pattern: pattern.name,
                month,
                day,
            },
            _ => DateMatch::Invalid {
                pattern: pattern.name,
            },
        };
    }
    DateMatch::None
}

/// Returns the `(month, day)` in `text`, if a valid one is present.
pub fn extract_month_day(text: &str) -> Option<(u32, u32)> {
    match match_date(text) {
        DateMatch::Valid { month, day, .. } => Some((month, day)),
        DateMatch::None | DateMatch::Invalid { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{extract_month_day, match_date, DateMatch};

    #[test]
    fn zero_padded_kanji_pattern() {
        assert_eq!(
            match_date("05月01日"),
            DateMatch::Valid {
                pattern: "mm_dd_kanji",
                month: 5,
                day: 1
            }
        );
    }

    #[test]
    fn loose_kanji_pattern() {
        assert_eq!(
            match_date("5月1日のできごと"),
            DateMatch::Valid {
                pattern: "m_d_kanji",
                month: 5,
                day: 1
            }
        );
    }

    #[test]
    fn zero_padded_slash_pattern() {
        assert_eq!(
            match_date("12/25"),
            DateMatch::Valid {
                pattern: "mm_dd_slash",
                month: 12,
                day: 25
            }
        );
    }

    #[test]
    fn loose_slash_pattern() {
        assert_eq!(
            match_date("日付は 7/4 です"),
            DateMatch::Valid {
                pattern: "m_d_slash",
                month: 7,
                day: 4
            }
        );
    }

    #[test]
    fn out_of_range_captures_are_invalid() {
        assert_eq!(
            match_date("13月01日"),
            DateMatch::Invalid {
                pattern: "mm_dd_kanji"
            }
        );
        assert_eq!(extract_month_day("02月30日"), None);
        assert_eq!(extract_month_day("4/31"), None);
    }

    #[test]
    fn leap_day_is_accepted() {
        assert_eq!(extract_month_day("2月29日"), Some((2, 29)));
    }

    #[test]
    fn digits_inside_longer_numbers_do_not_match() {
        assert_eq!(match_date("123月4日"), DateMatch::None);
        assert_eq!(match_date("2024/05/01/99"), DateMatch::None);
        assert_eq!(match_date("Mastodon"), DateMatch::None);
    }
}
