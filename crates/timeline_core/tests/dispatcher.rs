use chrono::{TimeZone, Utc};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use timeline_core::service::dispatcher::SCHEDULED_POST_HASHTAG;
use timeline_core::{
    BotConfig, BotContext, DispatchOutcome, Dispatcher, EventSnapshot, IgnoreReason, InboundMessage,
    MessageSender, SendError, SnapshotCell, TimelineEvent, Visibility,
};

#[derive(Default)]
struct RecordingSender {
    sent: RefCell<Vec<(String, Visibility, Option<String>)>>,
    fail: bool,
}

impl MessageSender for RecordingSender {
    fn send(&self, text: &str, visibility: Visibility, reply_to: Option<&str>) -> Result<(), SendError> {
        if self.fail {
            return Err(SendError::Transport("connection reset".to_string()));
        }
        self.sent
            .borrow_mut()
            .push((text.to_string(), visibility, reply_to.map(str::to_string)));
        Ok(())
    }
}

fn config(pairs: &[(&str, &str)]) -> BotConfig {
    let env: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    BotConfig::from_lookup(|key| env.get(key).cloned(), Path::new("/srv/timeline")).unwrap()
}

fn dispatcher(pairs: &[(&str, &str)], sender: RecordingSender) -> Dispatcher<RecordingSender> {
    let snapshot = EventSnapshot::from_events(vec![
        TimelineEvent::new(1990, 5, 1, "草の根BBSが開局。", ["dsns"]),
        TimelineEvent::new(2016, 4, 11, "Mastodon公開。", ["dsns", "tech"]),
    ]);
    Dispatcher::new(config(pairs), Arc::new(SnapshotCell::new(snapshot)), sender)
}

fn noon_jst_may_first() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 3, 0, 0).unwrap()
}

#[test]
fn reply_mirrors_visibility_and_targets_note() {
    let dispatcher = dispatcher(&[("BOT_USER_ID", "bot")], RecordingSender::default());
    let mut ctx = BotContext::new(noon_jst_may_first());
    let message = InboundMessage::new("@timeline 5月1日", "alice", "note-1", Visibility::Followers).mentioning("bot");

    let outcome = dispatcher.handle_message(&mut ctx, &message, noon_jst_may_first());
    assert!(matches!(outcome, DispatchOutcome::Sent { .. }));

    let sent = dispatcher.sender().sent.borrow();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].0.contains("草の根BBSが開局。"));
    assert!(sent[0].0.contains("?search="));
    assert_eq!(sent[0].1, Visibility::Followers);
    assert_eq!(sent[0].2.as_deref(), Some("note-1"));
    assert_eq!(ctx.messages_handled, 1);
    assert_eq!(ctx.last_message_at, Some(noon_jst_may_first()));
}

#[test]
fn own_and_unaddressed_notes_are_ignored() {
    let dispatcher = dispatcher(&[("BOT_USER_ID", "bot")], RecordingSender::default());
    let mut ctx = BotContext::new(noon_jst_may_first());

    let own = InboundMessage::new("今日", "bot", "note-1", Visibility::Public).mentioning("bot");
    assert_eq!(
        dispatcher.handle_message(&mut ctx, &own, noon_jst_may_first()),
        DispatchOutcome::Ignored(IgnoreReason::OwnMessage)
    );
    let unaddressed = InboundMessage::new("今日", "alice", "note-2", Visibility::Public);
    assert_eq!(
        dispatcher.handle_message(&mut ctx, &unaddressed, noon_jst_may_first()),
        DispatchOutcome::Ignored(IgnoreReason::NotMentioned)
    );
    assert_eq!(ctx.messages_handled, 0);
    assert!(dispatcher.sender().sent.borrow().is_empty());
}

#[test]
fn dry_run_returns_replies_without_sending() {
    let dispatcher = dispatcher(&[("DRY_RUN", "true")], RecordingSender::default());
    let mut ctx = BotContext::new(noon_jst_may_first());
    let message = InboundMessage::new("検索 Mastodon", "alice", "note-1", Visibility::Home);

    let outcome = dispatcher.handle_message(&mut ctx, &message, noon_jst_may_first());
    match outcome {
        DispatchOutcome::DryRun { messages } => assert!(messages[0].contains("**Mastodon**")),
        other => panic!("expected dry run, got {other:?}"),
    }
    assert!(dispatcher.sender().sent.borrow().is_empty());
}

#[test]
fn send_failures_are_counted() {
    let sender = RecordingSender {
        fail: true,
        ..RecordingSender::default()
    };
    let dispatcher = dispatcher(&[], sender);
    let mut ctx = BotContext::new(noon_jst_may_first());
    let message = InboundMessage::new("help", "alice", "note-1", Visibility::Home);

    let outcome = dispatcher.handle_message(&mut ctx, &message, noon_jst_may_first());
    assert!(matches!(outcome, DispatchOutcome::SendFailed { .. }));
    assert_eq!(ctx.send_failures, 1);
}

#[test]
fn status_reply_reflects_context_counters() {
    let dispatcher = dispatcher(&[], RecordingSender::default());
    let mut ctx = BotContext::new(noon_jst_may_first());
    ctx.errors = 1;
    ctx.messages_handled = 3;

    let message = InboundMessage::new("status bot", "alice", "note-1", Visibility::Home);
    dispatcher.handle_message(&mut ctx, &message, noon_jst_may_first());

    let sent = dispatcher.sender().sent.borrow();
    assert!(sent[0].0.contains("処理メッセージ数: 4件"));
    assert!(sent[0].0.contains("エラー数: 1件"));
}

#[test]
fn scheduled_post_fires_once_per_slot_in_configured_timezone() {
    let dispatcher = dispatcher(
        &[("POST_TIMES", "12:00"), ("SCHEDULED_POST_VISIBILITY", "public")],
        RecordingSender::default(),
    );
    let mut ctx = BotContext::new(noon_jst_may_first());
    let just_after_noon_jst = Utc.with_ymd_and_hms(2024, 5, 1, 3, 2, 0).unwrap();

    let before = Utc.with_ymd_and_hms(2024, 5, 1, 2, 59, 0).unwrap();
    assert_eq!(dispatcher.scheduled_post(&mut ctx, before), DispatchOutcome::NotDue);

    let outcome = dispatcher.scheduled_post(&mut ctx, just_after_noon_jst);
    assert!(matches!(outcome, DispatchOutcome::Sent { .. }));
    assert_eq!(
        dispatcher.scheduled_post(&mut ctx, just_after_noon_jst),
        DispatchOutcome::NotDue
    );

    let sent = dispatcher.sender().sent.borrow();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].0.starts_with("今日は、"));
    assert!(sent[0].0.ends_with(SCHEDULED_POST_HASHTAG));
    assert_eq!(sent[0].1, Visibility::Public);
    assert_eq!(sent[0].2, None);
}

#[test]
fn refresh_swaps_snapshot_for_later_messages() {
    let dispatcher = dispatcher(&[("DRY_RUN", "1")], RecordingSender::default());
    let mut ctx = BotContext::new(noon_jst_may_first());
    dispatcher.refresh(
        EventSnapshot::from_events(vec![TimelineEvent::new(2020, 5, 1, "新しいデータ。", ["tech"])]),
        None,
        &mut ctx,
    );

    let message = InboundMessage::new("5月1日", "alice", "note-1", Visibility::Home);
    let outcome = dispatcher.handle_message(&mut ctx, &message, noon_jst_may_first());
    assert!(outcome.messages()[0].contains("新しいデータ。"));
    assert!(!outcome.messages()[0].contains("草の根BBS"));
}

#[test]
fn unavailable_store_replies_with_apology_and_counts_error() {
    let cell = SnapshotCell::new(EventSnapshot::unavailable("database is locked"));
    let dispatcher = Dispatcher::new(config(&[]), Arc::new(cell), RecordingSender::default());
    let mut ctx = BotContext::new(noon_jst_may_first());
    let message = InboundMessage::new("5月1日", "alice", "note-1", Visibility::Home);

    let outcome = dispatcher.handle_message(&mut ctx, &message, noon_jst_may_first());
    assert!(matches!(outcome, DispatchOutcome::Sent { .. }));
    assert_eq!(ctx.errors, 1);
    assert_eq!(ctx.messages_handled, 1);

    let sent = dispatcher.sender().sent.borrow();
    assert_eq!(sent[0].0, "申し訳ございません。処理中にエラーが発生しました。");
    assert_eq!(sent[0].2.as_deref(), Some("note-1"));
}

#[test]
fn refresh_rereads_summary_files() {
    let dir = tempfile::tempdir().unwrap();
    let summaries_dir = dir.path().to_str().unwrap().to_string();
    let dispatcher = dispatcher(
        &[("DRY_RUN", "1"), ("SUMMARIES_DIR", summaries_dir.as_str())],
        RecordingSender::default(),
    );
    let mut ctx = BotContext::new(noon_jst_may_first());
    let message = InboundMessage::new("1990年代 概要", "alice", "note-1", Visibility::Home);

    std::fs::write(dir.path().join("1990s.md"), "# パソコン通信の時代").unwrap();
    let before = dispatcher.handle_message(&mut ctx, &message, noon_jst_may_first());
    assert!(before.messages()[0].contains("準備中"));

    dispatcher.refresh(dispatcher.snapshots().current().as_ref().clone(), None, &mut ctx);
    let after = dispatcher.handle_message(&mut ctx, &message, noon_jst_may_first());
    assert!(after.messages()[0].contains("**パソコン通信の時代**"));
}
