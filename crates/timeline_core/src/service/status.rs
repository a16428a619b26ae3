//! Runtime status snapshot and status report lines.

use crate::index::category_index::CategoryIndex;
use crate::model::command::StatusKind;
use crate::model::event::TimelineEvent;
use crate::repo::history_repo::UpdateRecord;
use chrono::{DateTime, Utc};

const PREVIEW_CHARS: usize = 40;

/// Process-level facts the evaluator cannot derive from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeStatus {
    pub started_at: DateTime<Utc>,
    pub now: DateTime<Utc>,
    pub messages_handled: u64,
    pub errors: u64,
    pub send_failures: u64,
    pub last_message_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub log_level: String,
    pub timezone: String,
    pub post_times: Vec<String>,
    pub timeline_url: String,
    pub last_update: Option<UpdateRecord>,
}

impl RuntimeStatus {
    /// Status of a process that has not handled any message yet.
    pub fn idle(now: DateTime<Utc>) -> Self {
        Self {
            started_at: now,
            now,
            messages_handled: 0,
            errors: 0,
            send_failures: 0,
            last_message_at: None,
            dry_run: false,
            log_level: "info".to_string(),
            timezone: "Asia/Tokyo".to_string(),
            post_times: Vec::new(),
            timeline_url: String::new(),
            last_update: None,
        }
    }

    /// Share of handled messages that failed, in `0.0..=1.0`.
    pub fn error_rate(&self) -> f64 {
        if self.messages_handled == 0 {
            return 0.0;
        }
        (self.errors as f64 / self.messages_handled as f64).clamp(0.0, 1.0)
    }

    /// Uptime rendered as `D日 H時間 M分`.
    pub fn uptime_label(&self) -> String {
        let total_minutes = (self.now - self.started_at).num_minutes().max(0);
        let days = total_minutes / (24 * 60);
        let hours = (total_minutes / 60) % 24;
        let minutes = total_minutes % 60;
        format!("{days}日 {hours}時間 {minutes}分")
    }
}

/// Builds the report lines for `kind` over `events`.
pub fn status_lines(kind: StatusKind, status: &RuntimeStatus, events: &[TimelineEvent]) -> Vec<String> {
    match kind {
        StatusKind::Basic => basic_lines(status, events),
        StatusKind::Server => server_lines(status),
        StatusKind::Bot => bot_lines(status),
        StatusKind::Timeline => timeline_lines(status, events),
    }
}

fn basic_lines(status: &RuntimeStatus, events: &[TimelineEvent]) -> Vec<String> {
    vec![
        "🤖 分散SNS年表bot ステータス".to_string(),
        String::new(),
        format!("⏰ 稼働時間: {}", status.uptime_label()),
        format!("📊 処理メッセージ数: {}件", status.messages_handled),
        format!("❌ エラー数: {}件", status.errors),
        format!("📈 エラー率: {:.1}%", status.error_rate() * 100.0),
        format!("📚 データベース: {}件のイベント", events.len()),
        String::new(),
        format!("設定: {}モード", mode_label(status.dry_run)),
        String::new(),
        "💡 詳細情報: 「ステータス サーバー」「ステータス ボット」「ステータス 年表」で個別詳細を確認できます".to_string(),
    ]
}

fn server_lines(status: &RuntimeStatus) -> Vec<String> {
    let post_times = if status.post_times.is_empty() {
        "なし".to_string()
    } else {
        status.post_times.join(", ")
    };
    vec![
        "🖥️ サーバー詳細ステータス".to_string(),
        String::new(),
        "💻 システム情報:".to_string(),
        format!("  • 稼働時間: {}", status.uptime_label()),
        format!("  • 起動時刻: {}", status.started_at.format("%Y-%m-%d %H:%M:%S UTC")),
        format!("  • プロセスID: {}", std::process::id()),
        String::new(),
        "⚙️ 設定情報:".to_string(),
        format!("  • ドライランモード: {}", enabled_label(status.dry_run)),
        format!("  • ログレベル: {}", status.log_level),
        format!("  • タイムゾーン: {}", status.timezone),
        format!("  • 定時投稿: {post_times}"),
    ]
}

fn bot_lines(status: &RuntimeStatus) -> Vec<String> {
    let last_message = status
        .last_message_at
        .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "N/A".to_string());
    vec![
        "🤖 ボット詳細ステータス".to_string(),
        String::new(),
        "📊 処理統計:".to_string(),
        format!("  • 処理メッセージ数: {}件", status.messages_handled),
        format!("  • エラー数: {}件", status.errors),
        format!("  • 送信失敗数: {}件", status.send_failures),
        format!("  • エラー率: {:.1}%", status.error_rate() * 100.0),
        format!("  • 処理成功率: {:.1}%", (1.0 - status.error_rate()) * 100.0),
        format!("  • 最終処理時刻: {last_message}"),
    ]
}

fn timeline_lines(status: &RuntimeStatus, events: &[TimelineEvent]) -> Vec<String> {
    let oldest = events.iter().min_by(|a, b| a.chronological_cmp(b));
    let newest = events.iter().max_by(|a, b| a.chronological_cmp(b));
    let decades = CategoryIndex::build(events)
        .decade_distribution(None)
        .into_iter()
        .map(|(decade, count)| format!("{decade}: {count}件"))
        .collect::<Vec<_>>();
    let decades = if decades.is_empty() {
        "N/A".to_string()
    } else {
        decades.join(", ")
    };
    let year_range = match (oldest, newest) {
        (Some(oldest), Some(newest)) => format!("{}年〜{}年", oldest.year, newest.year),
        _ => "N/A".to_string(),
    };

    vec![
        "📚 年表詳細ステータス".to_string(),
        String::new(),
        "🗄️ データベース情報:".to_string(),
        format!("  • 総イベント数: {}件", events.len()),
        format!("  • 最終更新: {}", update_time_label(status.last_update.as_ref())),
        format!("  • 更新結果: {}", update_result_label(status.last_update.as_ref())),
        String::new(),
        "📅 データ範囲:".to_string(),
        format!("  • 収録期間: {year_range}"),
        format!("  • 最古のイベント: {}", event_label(oldest)),
        format!("  • 最新のイベント: {}", event_label(newest)),
        format!("  • 年代別分布: {decades}"),
        String::new(),
        "🔗 データソース:".to_string(),
        format!("  • 年表URL: {}", status.timeline_url),
    ]
}

fn event_label(event: Option<&TimelineEvent>) -> String {
    match event {
        Some(event) => {
            let preview: String = event.content.chars().take(PREVIEW_CHARS).collect();
            let ellipsis = if event.content.chars().count() > PREVIEW_CHARS {
                "…"
            } else {
                ""
            };
            format!("{} {}{}", event.iso_date(), preview.replace('\n', " "), ellipsis)
        }
        None => "N/A".to_string(),
    }
}

fn update_time_label(record: Option<&UpdateRecord>) -> String {
    record
        .and_then(|record| DateTime::<Utc>::from_timestamp_millis(record.updated_at))
        .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

fn update_result_label(record: Option<&UpdateRecord>) -> String {
    match record {
        Some(record) => format!(
            "{} (追加 {}件 / 更新 {}件 / 総計 {}件)",
            record.status, record.events_added, record.events_updated, record.events_total
        ),
        None => "N/A".to_string(),
    }
}

fn mode_label(dry_run: bool) -> &'static str {
    if dry_run {
        "🔧 ドライラン"
    } else {
        "🚀 本番"
    }
}

fn enabled_label(enabled: bool) -> &'static str {
    if enabled {
        "✅ 有効"
    } else {
        "❌ 無効"
    }
}

#[cfg(test)]
mod tests {
    use super::{status_lines, RuntimeStatus};
    use crate::model::command::StatusKind;
    use crate::model::event::TimelineEvent;
    use chrono::{Duration, TimeZone, Utc};

    fn status() -> RuntimeStatus {
        let started = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut status = RuntimeStatus::idle(started);
        status.now = started + Duration::minutes(26 * 60 + 5);
        status.messages_handled = 4;
        status.errors = 1;
        status
    }

    #[test]
    fn uptime_and_error_rate() {
        let status = status();
        assert_eq!(status.uptime_label(), "1日 2時間 5分");
        assert!((status.error_rate() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn timeline_report_includes_range_and_decades() {
        let events = vec![
            TimelineEvent::new(1995, 5, 1, "古い", Vec::<String>::new()),
            TimelineEvent::new(2016, 4, 11, "新しい", Vec::<String>::new()),
        ];
        let lines = status_lines(StatusKind::Timeline, &status(), &events);
        assert!(lines.iter().any(|line| line.contains("1995年〜2016年")));
        assert!(lines.iter().any(|line| line.contains("1990s: 1件, 2010s: 1件")));
        assert!(lines.iter().any(|line| line.contains("最終更新: N/A")));
    }

    #[test]
    fn basic_report_counts_events() {
        let lines = status_lines(StatusKind::Basic, &status(), &[]);
        assert!(lines.iter().any(|line| line == "📚 データベース: 0件のイベント"));
        assert!(lines.iter().any(|line| line == "📈 エラー率: 25.0%"));
    }
}
