//! Reply rendering under the message length budget.
//!
//! # Responsibility
//! - Render a [`ResultSet`] as post text: header, items, footer, link.
//! - Keep each message within [`MessageLimits`], counting Unicode scalars.
//!
//! # Invariants
//! - Output is never empty and never cuts inside an item, except for the
//!   hard guard on a single oversize item or header.
//! - The omission suffix always reports `total_count - rendered`.

use crate::model::command::{CategoryFilter, DecadeKind};
use crate::model::event::TimelineEvent;
use crate::model::result::{DecadeStatistics, QueryKind, ResultItem, ResultSet, StatRecord};
use crate::parser::decade::decade_name;
use crate::service::evaluator::EvalError;
use log::debug;
use once_cell::sync::Lazy;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::{NoExpand, Regex, RegexBuilder};

pub const DEFAULT_MAX_LENGTH: usize = 3000;
pub const DEFAULT_TRUNCATE_LENGTH: usize = 2997;

const HARD_CUT_MARKER: &str = "...";
const FAILURE_MESSAGE: &str = "申し訳ございません。処理中にエラーが発生しました。";
const DATE_FOOTER: &str = "だそうです！よかったね！";
const DISTRIBUTION_BAR_MAX: usize = 20;

/// Characters left unescaped in the `search` query parameter.
const SEARCH_PARAM: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

static ALNUM_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-zA-Z0-9])\n+([a-zA-Z0-9])").expect("valid alnum break regex"));
static KANA_BREAK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([ぁ-んァ-ヶ一-龠ー])\n+([ぁ-んァ-ヶ一-龠ーa-zA-Z0-9])").expect("valid kana break regex")
});
static BLANK_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid blank run regex"));
static SPACE_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").expect("valid space run regex"));

/// Length budget for one outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageLimits {
    /// Messages up to this many characters are sent unchanged.
    pub max_length: usize,
    /// Target length when items have to be dropped.
    pub truncate_length: usize,
}

impl Default for MessageLimits {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            truncate_length: DEFAULT_TRUNCATE_LENGTH,
        }
    }
}

/// Renders `result` without a source link.
pub fn format(result: &ResultSet, limits: &MessageLimits) -> Vec<String> {
    format_with_link(result, limits, None)
}

/// Renders `result`, appending a link into `timeline_url` when the query
/// has a searchable form.
pub fn format_with_link(
    result: &ResultSet,
    limits: &MessageLimits,
    timeline_url: Option<&str>,
) -> Vec<String> {
    let link = timeline_url
        .and_then(|base| timeline_link(&result.query, base))
        .map(|url| format!("[年表はこちら]({url})"));

    if result.is_empty() {
        let message = compose(&[Some(no_results_message(&result.query)), link]);
        return vec![hard_guard(message, limits)];
    }

    let layout = layout(result);
    let (message, rendered) = fit(&layout, result.total_count, link.as_deref(), limits);
    let message = hard_guard(message, limits);
    debug!(
        "event=reply_format module=service status=ok rendered={} total={} chars={}",
        rendered,
        result.total_count,
        char_len(&message)
    );
    vec![message]
}

/// Fixed reply for evaluation failures.
pub fn format_failure(err: &EvalError) -> String {
    debug!("event=reply_format module=service status=failure error={err}");
    FAILURE_MESSAGE.to_string()
}

/// Suffix announcing omitted matches.
pub fn omission_suffix(remaining: usize) -> String {
    format!("（他に{remaining}件あります）")
}

/// Builds `<base>?search=<param>` for queries the timeline page can search.
pub fn timeline_link(query: &QueryKind, base_url: &str) -> Option<String> {
    let base = base_url.trim().trim_end_matches('?');
    if base.is_empty() {
        return None;
    }
    let param = match query {
        QueryKind::Date { month, day, .. } => format!("{month:02}月{day:02}日"),
        QueryKind::Search { keyword, filter } => {
            if !keyword.is_empty() {
                keyword.clone()
            } else {
                filter.as_ref().filter(|f| !f.is_empty())?.to_string()
            }
        }
        QueryKind::Decade { start_year, .. } => format!("{start_year}年代"),
        QueryKind::CategoryAnalysis(filter) => filter.to_string(),
        QueryKind::Help | QueryKind::Status(_) | QueryKind::CategoryList | QueryKind::CategoryStats => {
            return None
        }
    };
    Some(format!(
        "{base}?search={}",
        utf8_percent_encode(&param, SEARCH_PARAM)
    ))
}

struct Layout {
    header: Option<String>,
    items: Vec<String>,
    separator: &'static str,
    footer: Option<String>,
}

/// Adds items greedily until the next one would break the budget.
fn fit(layout: &Layout, total_count: usize, link: Option<&str>, limits: &MessageLimits) -> (String, usize) {
    let all = layout.items.len();
    let full = render(layout, all, total_count, link);
    if char_len(&full) <= limits.max_length {
        return (full, all);
    }

    let worst_suffix = omission_suffix(total_count);
    let mut rendered = 0;
    while rendered < all {
        let candidate = render_with_suffix(layout, rendered + 1, Some(&worst_suffix), link);
        if char_len(&candidate) > limits.truncate_length {
            break;
        }
        rendered += 1;
    }
    // A lone oversize item is kept and left to the hard guard.
    let rendered = rendered.max(1).min(all);
    (render(layout, rendered, total_count, link), rendered)
}

fn render(layout: &Layout, rendered: usize, total_count: usize, link: Option<&str>) -> String {
    let suffix = (rendered < total_count).then(|| omission_suffix(total_count - rendered));
    render_with_suffix(layout, rendered, suffix.as_deref(), link)
}

fn render_with_suffix(layout: &Layout, rendered: usize, suffix: Option<&str>, link: Option<&str>) -> String {
    let body = (rendered > 0).then(|| layout.items[..rendered].join(layout.separator));
    compose(&[
        layout.header.clone(),
        body,
        layout.footer.clone(),
        suffix.map(str::to_string),
        link.map(str::to_string),
    ])
}

fn compose(blocks: &[Option<String>]) -> String {
    blocks
        .iter()
        .flatten()
        .filter(|block| !block.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn hard_guard(message: String, limits: &MessageLimits) -> String {
    if char_len(&message) <= limits.max_length {
        return message;
    }
    let keep = limits
        .truncate_length
        .min(limits.max_length.saturating_sub(HARD_CUT_MARKER.len()));
    let mut cut: String = message.chars().take(keep).collect();
    cut.push_str(HARD_CUT_MARKER);
    cut
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn layout(result: &ResultSet) -> Layout {
    match &result.query {
        QueryKind::Date {
            month,
            day,
            is_today,
        } => Layout {
            header: Some(date_header(*month, *day, *is_today)),
            items: result
                .events()
                .map(|event| render_date_event(event, *month, *day))
                .collect(),
            separator: "\n\n",
            footer: Some(DATE_FOOTER.to_string()),
        },
        QueryKind::Search { keyword, filter } => Layout {
            header: Some(search_header(keyword, filter.as_ref())),
            items: result
                .events()
                .map(|event| render_search_event(event, keyword))
                .collect(),
            separator: "\n\n",
            footer: None,
        },
        QueryKind::Decade {
            start_year,
            end_year,
            kind,
            filter,
        } => decade_layout(result, *start_year, *end_year, *kind, filter.as_ref()),
        QueryKind::Help | QueryKind::Status(_) => Layout {
            header: None,
            items: line_texts(result),
            separator: "\n",
            footer: None,
        },
        QueryKind::CategoryList => Layout {
            header: Some("🗂️ **利用可能なカテゴリ一覧**".to_string()),
            items: category_list_items(result),
            separator: "\n",
            footer: Some(
                [
                    "📝 **使用例**",
                    "• `カテゴリ dsns+tech` → dsnsかつtechカテゴリのイベント",
                    "• `カテゴリ dsns+tech-meme` → dsns・techだがmeme以外のイベント",
                    "• `カテゴリ分析 dsns` → dsnsとよく組み合わさるカテゴリ",
                ]
                .join("\n"),
            ),
        },
        QueryKind::CategoryStats => Layout {
            header: Some("📊 **カテゴリ統計情報**".to_string()),
            items: category_stats_items(result),
            separator: "\n",
            footer: None,
        },
        QueryKind::CategoryAnalysis(filter) => Layout {
            header: Some(format!("🧩 **{filter}とよく組み合わさるカテゴリ**")),
            items: result
                .items
                .iter()
                .filter_map(|item| match item {
                    ResultItem::Stat(StatRecord::CategoryCount { category, count }) => {
                        Some((category, count))
                    }
                    _ => None,
                })
                .enumerate()
                .map(|(position, (category, count))| format!("{}. {category}: {count}回", position + 1))
                .collect(),
            separator: "\n",
            footer: None,
        },
    }
}

fn decade_layout(
    result: &ResultSet,
    start_year: i32,
    end_year: i32,
    kind: DecadeKind,
    filter: Option<&CategoryFilter>,
) -> Layout {
    let name = decade_name(start_year, end_year);
    match kind {
        DecadeKind::Statistics => Layout {
            header: None,
            items: result
                .items
                .iter()
                .filter_map(|item| match item {
                    ResultItem::Stat(StatRecord::Decade(stats)) => {
                        Some(render_decade_statistics(stats, filter))
                    }
                    _ => None,
                })
                .collect(),
            separator: "\n\n",
            footer: None,
        },
        DecadeKind::Representative => Layout {
            header: Some(format!(
                "✨ **{name}の主要な出来事{}**",
                filter_label(filter)
            )),
            items: result.events().map(render_representative_event).collect(),
            separator: "\n\n",
            footer: None,
        },
        DecadeKind::Summary => Layout {
            header: Some(format!("📖 **{name}の概要**")),
            items: line_texts(result),
            separator: "\n",
            footer: None,
        },
    }
}

fn date_header(month: u32, day: u32, is_today: bool) -> String {
    if is_today {
        "今日は、".to_string()
    } else {
        format!("{month}月{day}日は、")
    }
}

fn search_header(keyword: &str, filter: Option<&CategoryFilter>) -> String {
    match (keyword.is_empty(), filter) {
        (true, Some(filter)) => format!("カテゴリ{filter}の検索結果："),
        (false, Some(filter)) => format!("「{keyword}」＋カテゴリ{filter}の検索結果："),
        (_, None) => format!("「{keyword}」の検索結果："),
    }
}

fn no_results_message(query: &QueryKind) -> String {
    match query {
        QueryKind::Date {
            month,
            day,
            is_today,
        } => format!(
            "{}\nなんの日でもありません\n{DATE_FOOTER}",
            date_header(*month, *day, *is_today)
        ),
        QueryKind::Search { keyword, filter } => match (keyword.is_empty(), filter) {
            (true, Some(filter)) => format!("カテゴリ{filter}に該当するできごとは見つかりませんでした。"),
            (false, Some(filter)) => {
                format!("「{keyword}」かつカテゴリ{filter}に関するできごとは見つかりませんでした。")
            }
            (_, None) => format!("「{keyword}」に関するできごとは見つかりませんでした。"),
        },
        QueryKind::Decade {
            start_year,
            end_year,
            filter,
            ..
        } => format!(
            "{}{}のイベントは見つかりませんでした。",
            decade_name(*start_year, *end_year),
            filter_label(filter.as_ref())
        ),
        QueryKind::CategoryList => "利用可能なカテゴリが見つかりませんでした。".to_string(),
        QueryKind::CategoryStats => "カテゴリ付きのイベントがまだありません。".to_string(),
        QueryKind::CategoryAnalysis(filter) => {
            format!("指定カテゴリ{filter}と共起するカテゴリは見つかりませんでした。")
        }
        QueryKind::Help | QueryKind::Status(_) => "表示できる情報がありません。".to_string(),
    }
}

/// `（カテゴリ: a, b, 除外: c）`, or nothing without a filter.
fn filter_label(filter: Option<&CategoryFilter>) -> String {
    let Some(filter) = filter.filter(|filter| !filter.is_empty()) else {
        return String::new();
    };
    let mut parts = Vec::new();
    if !filter.include.is_empty() {
        parts.push(format!(
            "カテゴリ: {}",
            filter.include.iter().cloned().collect::<Vec<_>>().join(", ")
        ));
    }
    if !filter.exclude.is_empty() {
        parts.push(format!(
            "除外: {}",
            filter.exclude.iter().cloned().collect::<Vec<_>>().join(", ")
        ));
    }
    format!("（{}）", parts.join(", "))
}

fn render_date_event(event: &TimelineEvent, month: u32, day: u32) -> String {
    let content = emphasize_target_date(&event.content, month, day);
    format!("**{}年**{}", event.year, normalize_line_breaks(&content))
}

fn render_search_event(event: &TimelineEvent, keyword: &str) -> String {
    format!(
        "**{}年**{}　{}",
        event.year,
        event.date_label(),
        emphasize_keyword(&event.content, keyword)
    )
}

fn render_representative_event(event: &TimelineEvent) -> String {
    format!(
        "**{}年**{}　{}",
        event.year,
        event.date_label(),
        first_sentence(&event.content)
    )
}

fn render_decade_statistics(stats: &DecadeStatistics, filter: Option<&CategoryFilter>) -> String {
    let mut lines = vec![
        format!("📊 **{}の統計情報{}**", stats.decade, filter_label(filter)),
        format!("・期間: {}年〜{}年", stats.start_year, stats.end_year),
        format!("・総イベント数: {}件", stats.total_events),
        format!("・年平均: {:.1}件", stats.average_per_year),
        format!("・最も多い年: {}年 ({}件)", stats.max_year.0, stats.max_year.1),
        format!("・最も少ない年: {}年 ({}件)", stats.min_year.0, stats.min_year.1),
        String::new(),
        "📅 **年別分布**".to_string(),
    ];
    lines.extend(stats.year_distribution.iter().map(|(year, count)| {
        let bar = "█".repeat((*count).min(DISTRIBUTION_BAR_MAX));
        format!("{year}年: {bar} {count}件")
    }));
    lines.join("\n")
}

fn line_texts(result: &ResultSet) -> Vec<String> {
    result
        .items
        .iter()
        .filter_map(|item| match item {
            ResultItem::Stat(StatRecord::Line(line)) => Some(line.clone()),
            _ => None,
        })
        .collect()
}

/// Alphabetical list grouped under each leading letter.
fn category_list_items(result: &ResultSet) -> Vec<String> {
    let mut items = Vec::new();
    let mut current_group: Option<String> = None;
    for item in &result.items {
        let ResultItem::Stat(StatRecord::CategoryCount { category, count }) = item else {
            continue;
        };
        let group: String = category
            .chars()
            .next()
            .map(|first| first.to_uppercase().collect())
            .unwrap_or_default();
        let line = format!("• {category} ({count}件)");
        if current_group.as_deref() == Some(group.as_str()) {
            items.push(line);
        } else {
            let gap = if current_group.is_some() { "\n" } else { "" };
            items.push(format!("{gap}**{group}**\n{line}"));
            current_group = Some(group);
        }
    }
    items
}

fn category_stats_items(result: &ResultSet) -> Vec<String> {
    let mut items = Vec::new();
    let mut ranking_position = 0;
    let mut decade_heading_done = false;
    for item in &result.items {
        let ResultItem::Stat(record) = item else {
            continue;
        };
        match record {
            StatRecord::CategoryTotals {
                categories,
                events_with_categories,
            } => items.push(format!(
                "**総カテゴリ数**: {categories}個\n**カテゴリ付きイベント数**: {events_with_categories}件"
            )),
            StatRecord::CategoryCount { category, count } => {
                ranking_position += 1;
                let line = format!("{ranking_position}. {category}: {count}件");
                if ranking_position == 1 {
                    items.push(format!("\n**人気カテゴリ**\n{line}"));
                } else {
                    items.push(line);
                }
            }
            StatRecord::DecadeTopCategories { decade, top } => {
                let top = top
                    .iter()
                    .map(|(category, count)| format!("{category}({count})"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let line = format!("**{decade}**: {top}");
                if decade_heading_done {
                    items.push(line);
                } else {
                    decade_heading_done = true;
                    items.push(format!("\n**年代別カテゴリ分布**\n{line}"));
                }
            }
            StatRecord::Line(_) | StatRecord::Decade(_) => {}
        }
    }
    items
}

/// Bolds the first spelling of `month/day` found in `text`.
fn emphasize_target_date(text: &str, month: u32, day: u32) -> String {
    let mut patterns = vec![
        format!("{month:02}月{day:02}日"),
        format!("{month}月{day:02}日"),
        format!("{month:02}月{day}日"),
        format!("{month}月{day}日"),
    ];
    patterns.sort_by_key(|pattern| std::cmp::Reverse(pattern.len()));
    patterns.dedup();
    for pattern in &patterns {
        if text.contains(pattern.as_str()) {
            let bold = format!("**{pattern}**");
            if text.contains(bold.as_str()) {
                return text.to_string();
            }
            return text.replace(pattern.as_str(), &bold);
        }
    }
    text.to_string()
}

/// Joins lines broken inside words and collapses blank and space runs.
fn normalize_line_breaks(text: &str) -> String {
    let text = text.trim();
    let text = ALNUM_BREAK_RE.replace_all(text, "$1 $2");
    let text = KANA_BREAK_RE.replace_all(&text, "$1$2");
    let text = BLANK_RUN_RE.replace_all(&text, "\n\n");
    SPACE_RUN_RE.replace_all(&text, " ").into_owned()
}

/// Bolds every case-insensitive occurrence of `keyword`.
fn emphasize_keyword(text: &str, keyword: &str) -> String {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return text.to_string();
    }
    match RegexBuilder::new(&regex::escape(keyword))
        .case_insensitive(true)
        .build()
    {
        Ok(pattern) => pattern
            .replace_all(text, NoExpand(&format!("**{keyword}**")))
            .into_owned(),
        Err(_) => text.to_string(),
    }
}

/// Text up to and including the first `。`.
fn first_sentence(text: &str) -> String {
    match text.find('。') {
        Some(position) => text[..position + '。'.len_utf8()].to_string(),
        None => text.to_string(),
    }
}
