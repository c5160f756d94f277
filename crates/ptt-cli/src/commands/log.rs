//! Session log commands.

use std::fmt::Display;
use std::io::Write;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, TimeZone, Utc};
use clap::Args;
use ptt_core::path;
use ptt_core::{Color, DateRange, EventLog, TagTree, format_duration};
use ptt_db::Database;
use uuid::Uuid;

use super::open_database;
use super::util::{DayEdge, parse_bound, parse_datetime};
use crate::{Config, LogAction};

#[derive(Debug, Args)]
pub struct LogAddArgs {
    /// What the session was.
    #[arg(long)]
    pub title: String,
    /// Tag path, e.g. "Work > Meetings".
    #[arg(long)]
    pub tag: String,
    /// Start time (RFC 3339, "now", or relative like "2 hours ago").
    #[arg(long)]
    pub start: String,
    /// End time (RFC 3339, "now", or relative like "30 minutes ago").
    #[arg(long)]
    pub end: String,
    /// Calendar event the session belongs to.
    #[arg(long)]
    pub calendar_event: Option<String>,
    /// Mark the session as completed now.
    #[arg(long)]
    pub completed: bool,
}

#[derive(Debug, Args)]
pub struct LogListArgs {
    /// Only sessions starting at or after this bound.
    #[arg(long)]
    pub from: Option<String>,
    /// Only sessions ending at or before this bound.
    #[arg(long)]
    pub to: Option<String>,
    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct LogEditArgs {
    /// Session id.
    pub id: Uuid,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub tag: Option<String>,
    #[arg(long)]
    pub start: Option<String>,
    #[arg(long)]
    pub end: Option<String>,
    /// Mark the session as completed now.
    #[arg(long)]
    pub completed: bool,
}

#[derive(Debug, Args)]
pub struct LogIdArgs {
    /// Session id.
    pub id: Uuid,
}

pub fn run<W: Write>(writer: &mut W, action: &LogAction, config: &Config) -> Result<()> {
    let db = open_database(config)?;
    match action {
        LogAction::Add(args) => add(&db, writer, args),
        LogAction::List(args) => list(&db, writer, args),
        LogAction::Edit(args) => edit(&db, writer, args),
        LogAction::Delete(args) => delete(&db, writer, args),
    }
}

fn add<W: Write>(db: &Database, writer: &mut W, args: &LogAddArgs) -> Result<()> {
    let tag_path = normalize_tag_path(&args.tag)?;
    let tree = db.load_tags()?;
    let now = Utc::now();
    let log = EventLog {
        id: Uuid::new_v4(),
        calendar_event_id: args.calendar_event.clone().unwrap_or_default(),
        title: args.title.trim().to_string(),
        start_date: parse_datetime(&args.start).context("invalid --start")?,
        end_date: parse_datetime(&args.end).context("invalid --end")?,
        completed_at: args.completed.then_some(now),
        tag_color: tag_color(&tree, &tag_path),
        tag_path,
    };
    if log.end_date < log.start_date {
        tracing::warn!(id = %log.id, "session ends before it starts; it will count as zero");
    }

    db.insert_event_log(&log)?;
    writeln!(
        writer,
        "Logged {} under {} ({}) as {}",
        log.title,
        log.tag_path,
        format_duration(log.duration_secs()),
        log.id
    )?;
    Ok(())
}

fn list<W: Write>(db: &Database, writer: &mut W, args: &LogListArgs) -> Result<()> {
    let mut logs = db.list_event_logs()?;
    if args.from.is_some() || args.to.is_some() {
        let start = args
            .from
            .as_deref()
            .map(|s| parse_bound(s, DayEdge::Start))
            .transpose()?
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let end = args
            .to
            .as_deref()
            .map(|s| parse_bound(s, DayEdge::End))
            .transpose()?
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let range = DateRange::new(start, end);
        logs.retain(|log| range.contains(log));
    }

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&logs)?)?;
    } else {
        write_logs(writer, &logs, &Local)?;
    }
    Ok(())
}

/// Renders sessions one per line with times shown in `tz`.
pub fn write_logs<W: Write, Tz: TimeZone>(
    writer: &mut W,
    logs: &[EventLog],
    tz: &Tz,
) -> Result<()>
where
    Tz::Offset: Display,
{
    if logs.is_empty() {
        writeln!(writer, "No sessions logged.")?;
        return Ok(());
    }
    for log in logs {
        let start = log.start_date.with_timezone(tz);
        let done = if log.completed_at.is_some() { "✓" } else { " " };
        writeln!(
            writer,
            "{}  {} {:>8}  {done} {}  {}",
            log.id,
            start.format("%Y-%m-%d %H:%M"),
            format_duration(log.duration_secs()),
            log.tag_path,
            log.title
        )?;
    }
    Ok(())
}

fn edit<W: Write>(db: &Database, writer: &mut W, args: &LogEditArgs) -> Result<()> {
    let mut log = db
        .get_event_log(args.id)?
        .with_context(|| format!("session not found: {}", args.id))?;

    if let Some(title) = &args.title {
        log.title = title.trim().to_string();
    }
    if let Some(tag) = &args.tag {
        log.tag_path = normalize_tag_path(tag)?;
        log.tag_color = tag_color(&db.load_tags()?, &log.tag_path);
    }
    if let Some(start) = &args.start {
        log.start_date = parse_datetime(start).context("invalid --start")?;
    }
    if let Some(end) = &args.end {
        log.end_date = parse_datetime(end).context("invalid --end")?;
    }
    if args.completed && log.completed_at.is_none() {
        log.completed_at = Some(Utc::now());
    }

    if !db.update_event_log(&log)? {
        bail!("session not found: {}", args.id);
    }
    writeln!(
        writer,
        "Updated {} under {} ({})",
        log.title,
        log.tag_path,
        format_duration(log.duration_secs())
    )?;
    Ok(())
}

fn delete<W: Write>(db: &Database, writer: &mut W, args: &LogIdArgs) -> Result<()> {
    if !db.delete_event_log(args.id)? {
        bail!("session not found: {}", args.id);
    }
    writeln!(writer, "Deleted session {}", args.id)?;
    Ok(())
}

/// Trims every segment of a user-typed tag path.
fn normalize_tag_path(tag: &str) -> Result<String> {
    let segments: Vec<&str> = path::segments(tag.trim())
        .into_iter()
        .map(str::trim)
        .collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        bail!("invalid tag path: {tag:?}");
    }
    Ok(path::join(&segments))
}

/// Color name of the tag at `tag_path`, or the default color when the path is
/// not in the tree.
fn tag_color(tree: &TagTree, tag_path: &str) -> String {
    let color = tree.find_by_path(tag_path).map_or_else(
        || {
            tracing::debug!(tag_path, "tag path not in tree, using default color");
            Color::default()
        },
        |node| node.color,
    );
    color.name().to_string()
}
