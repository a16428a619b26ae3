//! Command-line entry point for the timeline bot.
//!
//! # Responsibility
//! - Load `.env` and configuration, start logging and open the store.
//! - Expose one-shot queries, a stdin note loop, scheduled posting and
//!   JSON import/export.

use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::error::Error;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use timeline_core::repo::history_repo::last_update;
use timeline_core::{
    export_file, import_file, init_logging, open_db, BotConfig, BotContext, DispatchOutcome,
    Dispatcher, EventSnapshot, InboundMessage, MessageSender, SendError, SnapshotCell,
    SqliteEventRepository, Visibility,
};

#[derive(Parser)]
#[command(name = "timeline", version, about = "On-this-day timeline bot")]
struct Cli {
    /// Log replies instead of sending them
    #[arg(long, global = true)]
    dry_run: bool,
    /// Override DATABASE_PATH
    #[arg(long, global = true)]
    database: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer one message and print the reply
    Ask {
        /// Message text, e.g. "5月1日" or "カテゴリ dsns+tech"
        text: String,
    },
    /// Print today's events
    Today,
    /// Read notes from stdin, one per line (plain text or JSON), and reply
    Listen,
    /// Post today's events if a scheduled slot is due
    PostScheduled {
        /// Post even when no slot is due
        #[arg(long)]
        force: bool,
    },
    /// Import events from a JSON document
    Import { file: PathBuf },
    /// Export every event to a JSON document
    Export { file: PathBuf },
    /// Check core linkage
    Ping,
}

/// Writes notes to stdout.
struct StdoutSender;

impl MessageSender for StdoutSender {
    fn send(&self, text: &str, visibility: Visibility, reply_to: Option<&str>) -> Result<(), SendError> {
        let mut out = std::io::stdout().lock();
        let target = reply_to.unwrap_or("-");
        writeln!(out, "[{visibility} reply_to={target}]\n{text}\n---")
            .and_then(|()| out.flush())
            .map_err(|err| SendError::Transport(err.to_string()))
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Command::Ping = cli.cmd {
        println!("timeline_core ping={}", timeline_core::ping());
        println!("timeline_core version={}", timeline_core::core_version());
        return Ok(());
    }

    let mut config = BotConfig::from_env()?;
    if cli.dry_run {
        config.dry_run = true;
    }
    if let Some(database) = cli.database {
        config.database_path = database;
    }
    init_logging(&config.log_level, &config.log_dir)?;

    let conn = open_db(&config.database_path)?;
    let repo = SqliteEventRepository::new(&conn);

    match &cli.cmd {
        Command::Import { file } => {
            let report = import_file(&conn, file)?;
            println!(
                "imported: added={} updated={} total={}",
                report.outcome.added, report.outcome.updated, report.total
            );
            return Ok(());
        }
        Command::Export { file } => {
            let count = export_file(&repo, file)?;
            println!("exported {count} events to {}", file.display());
            return Ok(());
        }
        _ => {}
    }

    let now = Utc::now();
    let mut ctx = BotContext::new(now);
    ctx.last_update = last_update(&conn)?;
    let snapshot = EventSnapshot::load(&repo).unwrap_or_else(|err| {
        warn!("event=snapshot_load module=cli status=error error={err}");
        EventSnapshot::unavailable(err.to_string())
    });
    let snapshots = Arc::new(SnapshotCell::new(snapshot));
    let dispatcher = Dispatcher::new(config, snapshots, StdoutSender);

    match cli.cmd {
        Command::Ask { text } => print_replies(&dispatcher.preview(&ctx, &text, now)),
        Command::Today => print_replies(&dispatcher.preview(&ctx, "今日", now)),
        Command::Listen => listen(&dispatcher, &mut ctx)?,
        Command::PostScheduled { force } => {
            let outcome = if force {
                dispatcher.post_today(&mut ctx, now)
            } else {
                dispatcher.scheduled_post(&mut ctx, now)
            };
            report(&outcome);
        }
        Command::Import { .. } | Command::Export { .. } | Command::Ping => {}
    }
    Ok(())
}

fn listen(dispatcher: &Dispatcher<StdoutSender>, ctx: &mut BotContext) -> Result<(), Box<dyn Error>> {
    info!("event=listen_start module=cli status=ok");
    let stdin = std::io::stdin();
    for (line_no, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(message) = inbound_from_line(line, line_no, dispatcher.config()) else {
            continue;
        };
        let now = Utc::now();
        report(&dispatcher.handle_message(ctx, &message, now));

        let scheduled = dispatcher.scheduled_post(ctx, now);
        if scheduled != DispatchOutcome::NotDue {
            report(&scheduled);
        }
    }
    info!(
        "event=listen_stop module=cli status=ok handled={} errors={} send_failures={}",
        ctx.messages_handled, ctx.errors, ctx.send_failures
    );
    Ok(())
}

/// JSON lines are full notes; plain lines are addressed to the bot.
fn inbound_from_line(line: &str, line_no: usize, config: &BotConfig) -> Option<InboundMessage> {
    if line.starts_with('{') {
        return match serde_json::from_str::<InboundMessage>(line) {
            Ok(message) => Some(message),
            Err(err) => {
                warn!("event=listen_line module=cli status=error line={line_no} error={err}");
                eprintln!("skipping line {}: {err}", line_no + 1);
                None
            }
        };
    }
    let message = InboundMessage::new(line, "stdin", format!("stdin-{}", line_no + 1), Visibility::Home);
    Some(match config.bot_user_id.as_deref() {
        Some(bot_id) => message.mentioning(bot_id),
        None => message,
    })
}

fn print_replies(replies: &[String]) {
    for reply in replies {
        println!("{reply}");
    }
}

fn report(outcome: &DispatchOutcome) {
    match outcome {
        DispatchOutcome::DryRun { messages } => {
            println!("[dry-run]");
            print_replies(messages);
        }
        DispatchOutcome::SendFailed { error, .. } => eprintln!("send failed: {error}"),
        DispatchOutcome::Ignored(reason) => eprintln!("ignored: {reason:?}"),
        DispatchOutcome::NotDue => println!("no scheduled slot is due"),
        DispatchOutcome::Sent { .. } => {}
    }
}
