//! Command recognition in priority order.
//!
//! 1. leading-token keywords (help, status, today)
//! 2. `カテゴリ` markers (一覧, 統計, 分析)
//! 3. decades and year ranges
//! 4. month/day dates
//! 5. leading (or trailing `探して`) search marker with optional category filter
//! 6. bare category expression
//! 7. keyword search on the whole text

use crate::model::command::{CategoryFilter, StatusKind, StructuredCommand};
use crate::parser::category_expr::parse_category_expr;
use crate::parser::date::extract_month_day;
use crate::parser::decade::{detect_decade_kind, match_year_range};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

const HELP_KEYWORDS: &[&str] = &["ヘルプ", "使い方", "つかいかた", "help"];
const STATUS_KEYWORDS: &[&str] = &["ステータス", "status", "状態", "じょうたい"];
const TODAY_KEYWORDS: &[&str] = &["今日", "きょう", "today"];

const STATUS_SUBTYPES: &[(&[&str], StatusKind)] = &[
    (&["サーバー", "server"], StatusKind::Server),
    (&["ボット", "bot"], StatusKind::Bot),
    (&["年表", "timeline"], StatusKind::Timeline),
];

const CATEGORY_MARKERS: &[&str] = &["カテゴリ", "category"];
const CATEGORY_LIST_WORDS: &[&str] = &["一覧", "list"];
const CATEGORY_STATS_WORDS: &[&str] = &["統計", "statistics", "stats"];
const CATEGORY_ANALYSIS_WORDS: &[&str] = &["分析", "analysis"];

const LEADING_SEARCH_MARKERS: &[&str] = &["検索", "けんさく", "search", "探して", "さがして"];
const TRAILING_SEARCH_MARKERS: &[&str] = &["探して", "さがして"];

static FILTER_CLAUSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|\s)(?:カテゴリ|category)\s+([\w+\-]+)").expect("valid filter regex")
});

/// Parses one mention body (mentions already stripped).
pub fn parse(text: &str) -> StructuredCommand {
    let command = parse_inner(text.trim());
    debug!(
        "event=command_parse module=parser status=ok kind={} input_len={}",
        command.kind_name(),
        text.chars().count()
    );
    command
}

fn parse_inner(text: &str) -> StructuredCommand {
    if text.is_empty() {
        return StructuredCommand::Help;
    }
    let lowered = text.to_lowercase();

    if let Some(command) = parse_leading_keyword(&lowered) {
        return command;
    }
    if let Some(command) = parse_category_marker(text) {
        return command;
    }
    if let Some((start_year, end_year)) = match_year_range(text) {
        return StructuredCommand::Decade {
            start_year,
            end_year,
            kind: detect_decade_kind(text),
            filter: find_filter_clause(text),
        };
    }
    if let Some((month, day)) = extract_month_day(text) {
        return StructuredCommand::DateQuery { month, day };
    }
    match strip_prefix_any(text, CATEGORY_MARKERS) {
        Some(rest) => {
            if !is_marker_word(rest) {
                let filter = parse_category_expr(rest);
                if !filter.is_empty() {
                    return StructuredCommand::Search {
                        keyword: String::new(),
                        filter: Some(filter),
                    };
                }
            }
        }
        None => {
            if let Some(command) = parse_search(text) {
                return command;
            }
        }
    }
    StructuredCommand::Search {
        keyword: text.to_string(),
        filter: None,
    }
}

fn parse_leading_keyword(lowered: &str) -> Option<StructuredCommand> {
    let mut tokens = lowered.split_whitespace();
    let first = tokens.next()?;
    if contains_any(first, HELP_KEYWORDS) {
        return Some(StructuredCommand::Help);
    }
    if contains_any(first, STATUS_KEYWORDS) {
        let rest: Vec<&str> = tokens.collect();
        let rest = rest.join(" ");
        let kind = STATUS_SUBTYPES
            .iter()
            .find(|(keywords, _)| contains_any(&rest, keywords))
            .map(|(_, kind)| *kind)
            .unwrap_or(StatusKind::Basic);
        return Some(StructuredCommand::Status(kind));
    }
    if contains_any(first, TODAY_KEYWORDS) {
        return Some(StructuredCommand::Today);
    }
    None
}

fn parse_category_marker(text: &str) -> Option<StructuredCommand> {
    let rest = strip_prefix_any(text, CATEGORY_MARKERS)?;
    if strip_prefix_any(rest, CATEGORY_LIST_WORDS).is_some() {
        return Some(StructuredCommand::CategoryList);
    }
    if strip_prefix_any(rest, CATEGORY_STATS_WORDS).is_some() {
        return Some(StructuredCommand::CategoryStats);
    }
    if let Some(expr) = strip_prefix_any(rest, CATEGORY_ANALYSIS_WORDS) {
        let filter = parse_category_expr(expr);
        if !filter.include.is_empty() {
            return Some(StructuredCommand::CategoryAnalysis(filter));
        }
    }
    None
}

fn parse_search(text: &str) -> Option<StructuredCommand> {
    let remainder = strip_search_marker(text)?.trim();
    // A clause at the very start is part of the keyword, not a filter.
    let clause = FILTER_CLAUSE_RE
        .captures_iter(remainder)
        .find(|captures| captures.get(0).is_some_and(|m| m.start() > 0));
    let (keyword, filter) = match clause {
        Some(captures) => {
            let clause_start = captures.get(0).map_or(remainder.len(), |m| m.start());
            let filter = parse_category_expr(captures.get(1).map_or("", |m| m.as_str()));
            (remainder[..clause_start].trim().to_string(), (!filter.is_empty()).then_some(filter))
        }
        None => (remainder.to_string(), None),
    };

    if keyword.is_empty() && filter.is_none() {
        return None;
    }
    Some(StructuredCommand::Search { keyword, filter })
}

/// Returns the text around a leading marker token or a trailing `探して`.
fn strip_search_marker(text: &str) -> Option<&str> {
    if let Some(rest) = strip_prefix_any(text, LEADING_SEARCH_MARKERS) {
        return Some(rest);
    }
    TRAILING_SEARCH_MARKERS
        .iter()
        .find_map(|marker| text.strip_suffix(marker))
}

fn is_marker_word(rest: &str) -> bool {
    [CATEGORY_LIST_WORDS, CATEGORY_STATS_WORDS, CATEGORY_ANALYSIS_WORDS]
        .iter()
        .any(|words| strip_prefix_any(rest, words).is_some())
}

fn find_filter_clause(text: &str) -> Option<CategoryFilter> {
    let captures = FILTER_CLAUSE_RE.captures(text)?;
    let filter = parse_category_expr(captures.get(1)?.as_str());
    (!filter.is_empty()).then_some(filter)
}

/// Strips a case-insensitive prefix and the whitespace after it.
///
/// ASCII prefixes must end at a word boundary; `research` does not start
/// with `search`.
fn strip_prefix_any<'t>(text: &'t str, prefixes: &[&str]) -> Option<&'t str> {
    prefixes.iter().find_map(|prefix| {
        let head = text.get(..prefix.len())?;
        let rest = &text[prefix.len()..];
        let glued = prefix.is_ascii() && rest.chars().next().is_some_and(|c| c.is_ascii_alphanumeric());
        (head.eq_ignore_ascii_case(prefix) && !glued).then(|| rest.trim_start())
    })
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}
