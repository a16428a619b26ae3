//! Query evaluation over an event store.
//!
//! # Responsibility
//! - Resolve one [`StructuredCommand`] into a [`ResultSet`].
//! - Apply presentation caps (representative picks, top-N rankings).
//!
//! # Invariants
//! - Evaluation is pure with respect to the store: reads only.
//! - The evaluator never truncates for message length; the formatter does.
//! - `total_count` always counts matches before presentation caps.

use crate::index::category_index::{rank, CategoryIndex};
use crate::model::command::{CategoryFilter, DecadeKind, StatusKind, StructuredCommand};
use crate::model::event::{decade_start, TimelineEvent};
use crate::model::result::{DecadeStatistics, QueryKind, ResultItem, ResultSet, StatRecord};
use crate::parser::decade::decade_name;
use crate::repo::event_repo::{EventStore, StoreError};
use crate::service::status::{status_lines, RuntimeStatus};
use crate::summary::SummaryLibrary;
use chrono::{Datelike, NaiveDate};
use log::{info, warn};
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Events shown per decade in representative reports.
pub const REPRESENTATIVE_PER_DECADE: usize = 5;
/// Co-occurring categories listed by an analysis.
pub const ANALYSIS_TOP_N: usize = 10;
/// Categories listed in the overall ranking of category statistics.
pub const STATS_TOP_N: usize = 10;
/// Categories listed per decade in category statistics.
pub const STATS_DECADE_TOP_N: usize = 3;

const HELP_TEXT: &str = "🤖 分散SNS関連年表bot の使い方

📅 **今日のイベント**
- 「今日」「きょう」「today」→ 今日の年表イベント

📆 **特定日付のイベント**
- 「5月1日」「05月01日」「5/1」→ その日の年表イベント

🔍 **検索機能**
- 「検索 キーワード」→ キーワードで年表を検索
- 「検索 SNS カテゴリ dsns+tech」→ 複合条件での検索

🗂️ **カテゴリ機能**
- 「カテゴリ dsns+tech」→ dsnsかつtechカテゴリのイベント一覧
- 「カテゴリ dsns+tech-meme」→ dsns・techだがmeme以外のイベント
- 「カテゴリ一覧」→ 利用可能なカテゴリ一覧を表示
- 「カテゴリ統計」→ 年代別のカテゴリ分布
- 「カテゴリ分析 dsns」→ dsnsと組み合わせられるカテゴリの統計

📊 **年代別機能**
- 「2000年代」「1990年代 統計」→ 年代別統計情報
- 「90年代 代表」「2000年代 代表」→ 年代別重要イベント
- 「1990年から1999年 概要」「2010年代 概要」→ 年代別概要
- 「2000年代 カテゴリ web+tech」→ 年代＋カテゴリの複合条件

📈 **ステータス機能**
- 「ステータス」「status」→ 基本ステータス情報
- 「ステータス サーバー」「status server」→ サーバー詳細情報
- 「ステータス ボット」「status bot」→ ボット詳細情報
- 「ステータス 年表」「status timeline」→ 年表詳細情報

❓ **その他**
- 「ヘルプ」「help」→ この使い方を表示";

/// Caps applied when presenting large answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentationCaps {
    pub representative_per_decade: usize,
    pub analysis_top_n: usize,
    pub stats_top_n: usize,
    pub stats_decade_top_n: usize,
}

impl Default for PresentationCaps {
    fn default() -> Self {
        Self {
            representative_per_decade: REPRESENTATIVE_PER_DECADE,
            analysis_top_n: ANALYSIS_TOP_N,
            stats_top_n: STATS_TOP_N,
            stats_decade_top_n: STATS_DECADE_TOP_N,
        }
    }
}

/// Per-request inputs other than the store.
#[derive(Debug, Clone)]
pub struct EvalContext<'a> {
    /// Local date in the configured timezone.
    pub today: NaiveDate,
    pub status: &'a RuntimeStatus,
    pub summaries: &'a SummaryLibrary,
    pub caps: PresentationCaps,
}

impl<'a> EvalContext<'a> {
    pub fn new(today: NaiveDate, status: &'a RuntimeStatus, summaries: &'a SummaryLibrary) -> Self {
        Self {
            today,
            status,
            summaries,
            caps: PresentationCaps::default(),
        }
    }
}

pub type EvalResult<T> = Result<T, EvalError>;

/// Evaluation failure.
#[derive(Debug)]
pub enum EvalError {
    /// The store could not serve a read.
    StoreUnavailable(StoreError),
}

impl Display for EvalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StoreUnavailable(err) => write!(f, "event store unavailable: {err}"),
        }
    }
}

impl Error for EvalError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StoreUnavailable(err) => Some(err),
        }
    }
}

impl From<StoreError> for EvalError {
    fn from(value: StoreError) -> Self {
        Self::StoreUnavailable(value)
    }
}

/// Evaluates `command` against `store`.
pub fn evaluate(
    command: &StructuredCommand,
    store: &dyn EventStore,
    ctx: &EvalContext<'_>,
) -> EvalResult<ResultSet> {
    let result = match command {
        StructuredCommand::Today => date_query(store, ctx.today.month(), ctx.today.day(), true),
        StructuredCommand::DateQuery { month, day } => date_query(store, *month, *day, false),
        StructuredCommand::Search { keyword, filter } => search(store, keyword, filter.as_ref()),
        StructuredCommand::Help => Ok(help()),
        StructuredCommand::Status(kind) => status(store, *kind, ctx.status),
        StructuredCommand::Decade {
            start_year,
            end_year,
            kind,
            filter,
        } => decade(store, ctx, *start_year, *end_year, *kind, filter.as_ref()),
        StructuredCommand::CategoryList => category_list(store),
        StructuredCommand::CategoryStats => category_stats(store, &ctx.caps),
        StructuredCommand::CategoryAnalysis(filter) => category_analysis(store, filter, &ctx.caps),
    };

    match &result {
        Ok(set) => info!(
            "event=query_eval module=service status=ok kind={} items={} total={} truncated={}",
            command.kind_name(),
            set.items.len(),
            set.total_count,
            set.truncated
        ),
        Err(err) => warn!(
            "event=query_eval module=service status=error kind={} error={}",
            command.kind_name(),
            err
        ),
    }
    result
}

fn date_query(store: &dyn EventStore, month: u32, day: u32, is_today: bool) -> EvalResult<ResultSet> {
    let events = store.by_date(month, day)?;
    Ok(ResultSet::complete(
        QueryKind::Date {
            month,
            day,
            is_today,
        },
        event_items(events),
    ))
}

fn search(store: &dyn EventStore, keyword: &str, filter: Option<&CategoryFilter>) -> EvalResult<ResultSet> {
    let needle = keyword.trim().to_lowercase();
    let events = store
        .all()?
        .into_iter()
        .filter(|event| needle.is_empty() || event.content.to_lowercase().contains(&needle))
        .filter(|event| filter.map_or(true, |filter| filter.matches(event)))
        .collect();
    Ok(ResultSet::complete(
        QueryKind::Search {
            keyword: keyword.trim().to_string(),
            filter: filter.cloned(),
        },
        event_items(events),
    ))
}

fn help() -> ResultSet {
    ResultSet::complete(QueryKind::Help, line_items(HELP_TEXT.lines().map(str::to_string)))
}

fn status(store: &dyn EventStore, kind: StatusKind, runtime: &RuntimeStatus) -> EvalResult<ResultSet> {
    let events = store.all()?;
    let lines = status_lines(kind, runtime, &events);
    Ok(ResultSet::complete(QueryKind::Status(kind), line_items(lines)))
}

fn decade(
    store: &dyn EventStore,
    ctx: &EvalContext<'_>,
    start_year: i32,
    end_year: i32,
    kind: DecadeKind,
    filter: Option<&CategoryFilter>,
) -> EvalResult<ResultSet> {
    let query = QueryKind::Decade {
        start_year,
        end_year,
        kind,
        filter: filter.cloned(),
    };
    match kind {
        DecadeKind::Summary => Ok(summary(ctx, query, start_year, end_year, filter)),
        DecadeKind::Statistics => {
            let events = decade_events(store, start_year, end_year, filter)?;
            if events.is_empty() {
                return Ok(ResultSet::empty(query));
            }
            let stats = decade_statistics(start_year, end_year, &events);
            Ok(ResultSet::complete(
                query,
                vec![ResultItem::Stat(StatRecord::Decade(stats))],
            ))
        }
        DecadeKind::Representative => {
            let events = decade_events(store, start_year, end_year, filter)?;
            let total = events.len();
            let picked = representative_events(events, ctx.caps.representative_per_decade);
            Ok(ResultSet::capped(query, event_items(picked), total))
        }
    }
}

fn decade_events(
    store: &dyn EventStore,
    start_year: i32,
    end_year: i32,
    filter: Option<&CategoryFilter>,
) -> EvalResult<Vec<TimelineEvent>> {
    Ok(store
        .by_year_range(start_year, end_year)?
        .into_iter()
        .filter(|event| filter.map_or(true, |filter| filter.matches(event)))
        .collect())
}

/// Computes statistics for `events`, all of which lie in the range.
pub fn decade_statistics(start_year: i32, end_year: i32, events: &[TimelineEvent]) -> DecadeStatistics {
    let mut year_distribution: BTreeMap<i32, usize> =
        (start_year..=end_year).map(|year| (year, 0)).collect();
    for event in events {
        *year_distribution.entry(event.year).or_default() += 1;
    }

    let populated = year_distribution.iter().filter(|(_, count)| **count > 0);
    let max_year = populated
        .clone()
        .fold(None, |best: Option<(i32, usize)>, (year, count)| match best {
            Some((_, best_count)) if best_count >= *count => best,
            _ => Some((*year, *count)),
        })
        .unwrap_or((start_year, 0));
    let min_year = populated
        .fold(None, |best: Option<(i32, usize)>, (year, count)| match best {
            Some((_, best_count)) if best_count <= *count => best,
            _ => Some((*year, *count)),
        })
        .unwrap_or((start_year, 0));

    let span = (i64::from(end_year) - i64::from(start_year) + 1).max(1);
    DecadeStatistics {
        decade: decade_name(start_year, end_year),
        start_year,
        end_year,
        total_events: events.len(),
        average_per_year: events.len() as f64 / span as f64,
        max_year,
        min_year,
        year_distribution,
    }
}

/// Picks up to `per_decade` events per decade.
///
/// Events with more categories rank first, then chronological order. Events
/// repeating an already picked content are skipped. Output is chronological.
pub fn representative_events(events: Vec<TimelineEvent>, per_decade: usize) -> Vec<TimelineEvent> {
    let mut by_decade: BTreeMap<i32, Vec<TimelineEvent>> = BTreeMap::new();
    for event in events {
        by_decade.entry(decade_start(event.year)).or_default().push(event);
    }

    let mut seen_content: HashSet<String> = HashSet::new();
    let mut picked = Vec::new();
    for (_, mut candidates) in by_decade {
        candidates.sort_by(|a, b| {
            b.categories
                .len()
                .cmp(&a.categories.len())
                .then_with(|| a.chronological_cmp(b))
        });
        let mut taken = 0;
        for event in candidates {
            if taken == per_decade {
                break;
            }
            if seen_content.insert(event.content.clone()) {
                picked.push(event);
                taken += 1;
            }
        }
    }
    picked.sort_by(TimelineEvent::chronological_cmp);
    picked
}

fn summary(
    ctx: &EvalContext<'_>,
    query: QueryKind,
    start_year: i32,
    end_year: i32,
    filter: Option<&CategoryFilter>,
) -> ResultSet {
    let summary = ctx.summaries.decade_summary(start_year, end_year);
    let mut lines: Vec<String> = summary.body.lines().map(str::to_string).collect();
    if let Some(filter) = filter {
        lines.push(String::new());
        lines.push(filter_note(filter));
    }
    ResultSet::complete(query, line_items(lines))
}

fn filter_note(filter: &CategoryFilter) -> String {
    let include = filter.include.iter().cloned().collect::<Vec<_>>().join(", ");
    let mut note = format!("**カテゴリフィルタ**: {include}");
    if !filter.exclude.is_empty() {
        let exclude = filter.exclude.iter().cloned().collect::<Vec<_>>().join(", ");
        note.push_str(&format!("（除外: {exclude}）"));
    }
    note
}

fn category_list(store: &dyn EventStore) -> EvalResult<ResultSet> {
    let events = store.all()?;
    let index = CategoryIndex::build(&events);
    let items = index
        .distribution()
        .into_iter()
        .map(|(category, count)| ResultItem::Stat(StatRecord::CategoryCount { category, count }))
        .collect();
    Ok(ResultSet::complete(QueryKind::CategoryList, items))
}

fn category_stats(store: &dyn EventStore, caps: &PresentationCaps) -> EvalResult<ResultSet> {
    let events = store.all()?;
    let index = CategoryIndex::build(&events);
    let ranked = index.ranked();
    if ranked.is_empty() {
        return Ok(ResultSet::empty(QueryKind::CategoryStats));
    }

    let mut items = vec![ResultItem::Stat(StatRecord::CategoryTotals {
        categories: ranked.len(),
        events_with_categories: index.events_with_categories(),
    })];
    items.extend(
        ranked
            .into_iter()
            .take(caps.stats_top_n)
            .map(|(category, count)| ResultItem::Stat(StatRecord::CategoryCount { category, count })),
    );
    items.extend(index.decade_category_counts().into_iter().map(|(decade, counts)| {
        let top = rank(counts).into_iter().take(caps.stats_decade_top_n).collect();
        ResultItem::Stat(StatRecord::DecadeTopCategories { decade, top })
    }));
    Ok(ResultSet::complete(QueryKind::CategoryStats, items))
}

fn category_analysis(
    store: &dyn EventStore,
    filter: &CategoryFilter,
    caps: &PresentationCaps,
) -> EvalResult<ResultSet> {
    let events = store.all()?;
    let index = CategoryIndex::build(&events);
    let ranking = index.co_occurring_filtered(filter);
    let total = ranking.len();
    let items = ranking
        .into_iter()
        .take(caps.analysis_top_n)
        .map(|(category, count)| ResultItem::Stat(StatRecord::CategoryCount { category, count }))
        .collect();
    Ok(ResultSet::capped(
        QueryKind::CategoryAnalysis(filter.clone()),
        items,
        total,
    ))
}

fn event_items(events: Vec<TimelineEvent>) -> Vec<ResultItem> {
    events.into_iter().map(ResultItem::Event).collect()
}

fn line_items(lines: impl IntoIterator<Item = String>) -> Vec<ResultItem> {
    lines
        .into_iter()
        .map(|line| ResultItem::Stat(StatRecord::Line(line)))
        .collect()
}
