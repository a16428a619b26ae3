//! Decade and year-range recognition.

use crate::model::command::DecadeKind;
use crate::model::event::decade_start;
use once_cell::sync::Lazy;
use regex::Regex;

static FULL_DECADE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^0-9])([0-9]{4})年代").expect("valid decade regex"));
static SHORT_DECADE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^0-9])([0-9]{2})年代").expect("valid short decade regex"));
static YEAR_RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^0-9])([0-9]{4})年から([0-9]{4})年").expect("valid year range regex")
});

const NAMED_DECADES: &[(&str, i32)] = &[("ゼロ年代", 2000), ("零年代", 2000), ("テン年代", 2010)];

/// Two-digit decades below this pivot belong to the 2000s.
const SHORT_DECADE_PIVOT: i32 = 20;

const REPRESENTATIVE_KEYWORDS: &[&str] =
    &["代表", "だいひょう", "重要", "じゅうよう", "representative"];
const SUMMARY_KEYWORDS: &[&str] = &["概要", "がいよう", "まとめ", "summary", "overview"];

/// Returns the inclusive year range named in `text`.
pub fn match_year_range(text: &str) -> Option<(i32, i32)> {
    if let Some(start) = NAMED_DECADES
        .iter()
        .find(|(name, _)| text.contains(name))
        .map(|(_, start)| *start)
    {
        return Some(decade_span(start));
    }
    if let Some(year) = first_number(&FULL_DECADE_RE, text, 1) {
        return Some(decade_span(decade_start(year)));
    }
    if let Some(captures) = YEAR_RANGE_RE.captures(text) {
        let first: i32 = captures.get(1)?.as_str().parse().ok()?;
        let second: i32 = captures.get(2)?.as_str().parse().ok()?;
        return Some((first.min(second), first.max(second)));
    }
    if let Some(short) = first_number(&SHORT_DECADE_RE, text, 1) {
        let century = if short < SHORT_DECADE_PIVOT { 2000 } else { 1900 };
        return Some(decade_span(decade_start(century + short)));
    }
    None
}

/// Detects the requested decade report; statistics is the default.
pub fn detect_decade_kind(text: &str) -> DecadeKind {
    let lowered = text.to_lowercase();
    if REPRESENTATIVE_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
    {
        DecadeKind::Representative
    } else if SUMMARY_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
        DecadeKind::Summary
    } else {
        DecadeKind::Statistics
    }
}

/// Display name such as `1990年代`, or `1995年〜2003年` for unaligned ranges.
pub fn decade_name(start_year: i32, end_year: i32) -> String {
    if start_year == decade_start(start_year) && end_year == start_year + 9 {
        format!("{start_year}年代")
    } else {
        format!("{start_year}年〜{end_year}年")
    }
}

fn decade_span(start: i32) -> (i32, i32) {
    (start, start + 9)
}

fn first_number(regex: &Regex, text: &str, group: usize) -> Option<i32> {
    regex.captures(text)?.get(group)?.as_str().parse().ok()
}
