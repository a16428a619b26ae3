//! Inbound note handling and scheduled posts.
//!
//! # Responsibility
//! - Gate notes (own notes, missing mention), strip mentions, then run
//!   parse, evaluate and format against one snapshot.
//! - Deliver replies through [`MessageSender`] with the inbound visibility.
//! - Post the daily "today" message when a configured slot is reached.
//!
//! # Invariants
//! - One message uses one `Arc<EventSnapshot>` from start to finish.
//! - Evaluation and send failures are counted in [`BotContext`], never raised.
//! - Log lines carry lengths and kinds, never note text.

use crate::config::BotConfig;
use crate::model::command::StructuredCommand;
use crate::model::message::{InboundMessage, Visibility};
use crate::parser::parse;
use crate::repo::history_repo::UpdateRecord;
use crate::repo::snapshot::{EventSnapshot, SnapshotCell};
use crate::service::evaluator::{evaluate, EvalContext};
use crate::service::formatter::{format_failure, format_with_link, MessageLimits};
use crate::service::status::RuntimeStatus;
use crate::summary::SummaryLibrary;
use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Utc};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, RwLock};

pub const SCHEDULED_POST_HASHTAG: &str = "#今日は何の日";
/// A slot stays due for this many minutes after its time.
pub const POST_SLOT_WINDOW_MINUTES: i64 = 10;

static LEADING_MENTIONS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\s*@[A-Za-z0-9_.\-]+(?:@[A-Za-z0-9_.\-]+)?)+\s*").expect("valid leading mention regex")
});

/// Failure reported by a [`MessageSender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The remote side refused the note.
    Rejected(String),
    Transport(String),
}

impl Display for SendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(message) => write!(f, "note rejected: {message}"),
            Self::Transport(message) => write!(f, "send transport failed: {message}"),
        }
    }
}

impl Error for SendError {}

/// Outbound channel for notes.
pub trait MessageSender {
    fn send(&self, text: &str, visibility: Visibility, reply_to: Option<&str>) -> Result<(), SendError>;
}

/// Mutable bot state threaded through the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct BotContext {
    pub started_at: DateTime<Utc>,
    pub messages_handled: u64,
    pub errors: u64,
    pub send_failures: u64,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_update: Option<UpdateRecord>,
    /// Local time of the last scheduled post attempt.
    pub last_scheduled_post: Option<NaiveDateTime>,
}

impl BotContext {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            messages_handled: 0,
            errors: 0,
            send_failures: 0,
            last_message_at: None,
            last_update: None,
            last_scheduled_post: None,
        }
    }

    /// Status snapshot for status commands.
    pub fn runtime_status(&self, config: &BotConfig, now: DateTime<Utc>) -> RuntimeStatus {
        RuntimeStatus {
            started_at: self.started_at,
            now,
            messages_handled: self.messages_handled,
            errors: self.errors,
            send_failures: self.send_failures,
            last_message_at: self.last_message_at,
            dry_run: config.dry_run,
            log_level: config.log_level.clone(),
            timezone: config.timezone.name().to_string(),
            post_times: config.post_time_labels(),
            timeline_url: config.timeline_url.clone(),
            last_update: self.last_update.clone(),
        }
    }
}

/// Why a note was not answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    OwnMessage,
    NotMentioned,
}

/// Result of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Ignored(IgnoreReason),
    /// No scheduled slot is due.
    NotDue,
    Sent { messages: Vec<String> },
    /// Dry-run mode: replies were logged, not sent.
    DryRun { messages: Vec<String> },
    SendFailed { messages: Vec<String>, error: SendError },
}

impl DispatchOutcome {
    /// Reply texts produced, if any.
    pub fn messages(&self) -> &[String] {
        match self {
            Self::Sent { messages } | Self::DryRun { messages } | Self::SendFailed { messages, .. } => {
                messages.as_slice()
            }
            Self::Ignored(_) | Self::NotDue => &[],
        }
    }
}

/// Routes notes through the query pipeline to a sender.
pub struct Dispatcher<S: MessageSender> {
    config: BotConfig,
    snapshots: Arc<SnapshotCell>,
    summaries: RwLock<Arc<SummaryLibrary>>,
    sender: S,
}

impl<S: MessageSender> Dispatcher<S> {
    pub fn new(config: BotConfig, snapshots: Arc<SnapshotCell>, sender: S) -> Self {
        let summaries = SummaryLibrary::load(config.summaries_dir.clone());
        Self {
            config,
            snapshots,
            summaries: RwLock::new(Arc::new(summaries)),
            sender,
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn snapshots(&self) -> &SnapshotCell {
        &self.snapshots
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    /// Answers one inbound note.
    pub fn handle_message(
        &self,
        ctx: &mut BotContext,
        message: &InboundMessage,
        now: DateTime<Utc>,
    ) -> DispatchOutcome {
        if let Some(bot_id) = self.config.bot_user_id.as_deref() {
            if message.author_id == bot_id {
                info!("event=message_ignore module=dispatcher status=skip reason=own_message");
                return DispatchOutcome::Ignored(IgnoreReason::OwnMessage);
            }
            if !message.mentions(bot_id) {
                info!("event=message_ignore module=dispatcher status=skip reason=not_mentioned");
                return DispatchOutcome::Ignored(IgnoreReason::NotMentioned);
            }
        }

        ctx.messages_handled += 1;
        ctx.last_message_at = Some(now);

        let text = strip_mentions(&message.text, self.config.bot_username.as_deref());
        info!(
            "event=message_receive module=dispatcher status=ok visibility={} input_len={}",
            message.visibility,
            text.chars().count()
        );

        let command = parse(&text);
        let replies = self.render(ctx, &command, now, &self.config.limits);
        self.deliver(ctx, replies, message.visibility, Some(&message.note_id))
    }

    /// Posts today's events when a configured slot is due.
    pub fn scheduled_post(&self, ctx: &mut BotContext, now: DateTime<Utc>) -> DispatchOutcome {
        let local = now.with_timezone(&self.config.timezone).naive_local();
        match due_post_slot(local, &self.config.post_times, ctx.last_scheduled_post) {
            Some(slot) => {
                info!(
                    "event=scheduled_post module=dispatcher status=due slot={}",
                    slot.format("%Y-%m-%d %H:%M")
                );
                self.post_today(ctx, now)
            }
            None => DispatchOutcome::NotDue,
        }
    }

    /// Posts today's events unconditionally with the scheduled visibility.
    pub fn post_today(&self, ctx: &mut BotContext, now: DateTime<Utc>) -> DispatchOutcome {
        ctx.last_scheduled_post = Some(now.with_timezone(&self.config.timezone).naive_local());

        let tag_len = SCHEDULED_POST_HASHTAG.chars().count() + 2;
        let limits = MessageLimits {
            max_length: self.config.limits.max_length.saturating_sub(tag_len).max(1),
            truncate_length: self.config.limits.truncate_length.saturating_sub(tag_len).max(1),
        };
        let mut replies = self.render(ctx, &StructuredCommand::Today, now, &limits);
        if let Some(last) = replies.last_mut() {
            last.push_str("\n\n");
            last.push_str(SCHEDULED_POST_HASHTAG);
        }
        self.deliver(ctx, replies, self.config.scheduled_post_visibility, None)
    }

    /// Replies for `text` without sending or touching counters.
    pub fn preview(&self, ctx: &BotContext, text: &str, now: DateTime<Utc>) -> Vec<String> {
        let command = parse(&strip_mentions(text, self.config.bot_username.as_deref()));
        let mut scratch = ctx.clone();
        self.render(&mut scratch, &command, now, &self.config.limits)
    }

    /// Publishes a refreshed snapshot and rereads the summary files.
    pub fn refresh(&self, snapshot: EventSnapshot, update: Option<UpdateRecord>, ctx: &mut BotContext) {
        self.snapshots.replace(snapshot);
        let summaries = Arc::new(SummaryLibrary::load(self.config.summaries_dir.clone()));
        *self
            .summaries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = summaries;
        if update.is_some() {
            ctx.last_update = update;
        }
    }

    fn summaries_current(&self) -> Arc<SummaryLibrary> {
        let guard = self
            .summaries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&*guard)
    }

    fn render(
        &self,
        ctx: &mut BotContext,
        command: &StructuredCommand,
        now: DateTime<Utc>,
        limits: &MessageLimits,
    ) -> Vec<String> {
        let snapshot = self.snapshots.current();
        let summaries = self.summaries_current();
        let status = ctx.runtime_status(&self.config, now);
        let today = now.with_timezone(&self.config.timezone).date_naive();
        let eval_ctx = EvalContext::new(today, &status, &summaries);

        match evaluate(command, snapshot.as_ref(), &eval_ctx) {
            Ok(result) => format_with_link(&result, limits, Some(&self.config.timeline_url)),
            Err(err) => {
                ctx.errors += 1;
                vec![format_failure(&err)]
            }
        }
    }

    fn deliver(
        &self,
        ctx: &mut BotContext,
        messages: Vec<String>,
        visibility: Visibility,
        reply_to: Option<&str>,
    ) -> DispatchOutcome {
        if self.config.dry_run {
            for message in &messages {
                info!(
                    "event=message_send module=dispatcher status=dry_run visibility={} chars={}",
                    visibility,
                    message.chars().count()
                );
            }
            return DispatchOutcome::DryRun { messages };
        }

        for message in &messages {
            if let Err(error) = self.sender.send(message, visibility, reply_to) {
                ctx.send_failures += 1;
                warn!(
                    "event=message_send module=dispatcher status=error visibility={} error={}",
                    visibility, error
                );
                return DispatchOutcome::SendFailed { messages, error };
            }
            info!(
                "event=message_send module=dispatcher status=ok visibility={} chars={}",
                visibility,
                message.chars().count()
            );
        }
        DispatchOutcome::Sent { messages }
    }
}

/// Removes leading `@user` / `@user@host` tokens and any `@bot_username`.
pub fn strip_mentions(text: &str, bot_username: Option<&str>) -> String {
    let mut text = LEADING_MENTIONS_RE.replace(text, "").into_owned();
    if let Some(username) = bot_username.filter(|name| !name.is_empty()) {
        text = text.replace(&format!("@{username}"), "");
    }
    text.trim().to_string()
}

/// Returns the slot that is due at local time `now`, if any.
///
/// A slot is due from its time until [`POST_SLOT_WINDOW_MINUTES`] later,
/// unless a post was already made at or after it.
pub fn due_post_slot(
    now: NaiveDateTime,
    post_times: &[NaiveTime],
    last_post: Option<NaiveDateTime>,
) -> Option<NaiveDateTime> {
    let window = Duration::minutes(POST_SLOT_WINDOW_MINUTES);
    let today = now.date();
    let dates = [Some(today), today.pred_opt()];

    dates
        .into_iter()
        .flatten()
        .flat_map(|date| post_times.iter().map(move |time| date.and_time(*time)))
        .filter(|slot| *slot <= now && now - *slot <= window)
        .filter(|slot| last_post.map_or(true, |last| last < *slot))
        .max()
}
