//! Report command for time per tag.
//!
//! This module implements `ptt report`: sessions inside a date range, narrowed
//! by tag filters, rolled up through the tag hierarchy and rendered as a tree
//! or as JSON.

use std::fmt::Display;
use std::io::Write;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, SecondsFormat, TimeZone, Utc};
use clap::Args;
use ptt_core::{
    DateRange, FilterSet, ReportDataPoint, TagFilter, aggregate, format_duration, total_duration,
};
use ptt_db::Database;
use serde::Serialize;

use super::open_database;
use super::util::{DayEdge, parse_bound};
use crate::Config;

/// Minimum width of the tag column.
const NAME_WIDTH: usize = 24;

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Start of the range (RFC 3339, YYYY-MM-DD, or relative like "2 weeks ago").
    /// Defaults to the configured number of days before --to.
    #[arg(long)]
    pub from: Option<String>,
    /// End of the range; a bare date means the end of that day. Defaults to now.
    #[arg(long)]
    pub to: Option<String>,
    /// Tag path pattern such as "Work > Meetings" or "Work > (Meetings|Calls)".
    /// Repeat to include several.
    #[arg(long = "filter", value_name = "PATTERN")]
    pub filters: Vec<String>,
    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Computed report data.
#[derive(Debug)]
pub struct ReportData {
    pub generated_at: DateTime<Utc>,
    pub range: DateRange,
    pub timezone: String,
    pub filters: Vec<String>,
    /// Sessions that passed the range and filters.
    pub session_count: usize,
    pub points: Vec<ReportDataPoint>,
}

// ========== Range ==========

/// Resolves the report window from the CLI bounds.
pub fn resolve_range(
    args: &ReportArgs,
    report_days: u32,
    now: DateTime<Utc>,
) -> Result<DateRange> {
    let end = args
        .to
        .as_deref()
        .map(|s| parse_bound(s, DayEdge::End))
        .transpose()?
        .unwrap_or(now);
    let range = match args.from.as_deref() {
        Some(s) => DateRange::new(parse_bound(s, DayEdge::Start)?, end),
        None => DateRange::last_days(end, report_days).with_context(|| {
            format!("report_days = {report_days} reaches past the earliest supported date")
        })?,
    };
    if range.start > range.end {
        bail!("--from must not be after --to");
    }
    Ok(range)
}

// ========== Progress Bar ==========

/// Generates a 10-character progress bar.
/// Values <5% of max get a single block for visibility.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn progress_bar(value: i64, max: i64) -> String {
    // Every duration is zero
    if max <= 0 {
        return "░░░░░░░░░░".to_string();
    }

    let ratio = value.max(0) as f64 / max as f64;
    let filled = if ratio < 0.05 && value > 0 {
        1
    } else {
        (ratio * 10.0).round().min(10.0) as usize
    };

    let empty = 10 - filled;
    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}

// ========== Report Generation ==========

/// Reads the sessions in `range` and rolls them up.
///
/// A storage failure is logged and yields an empty report.
pub fn generate_report_data(
    db: &Database,
    range: DateRange,
    filters: &FilterSet,
    generated_at: DateTime<Utc>,
) -> ReportData {
    let logs = match db.list_event_logs_in_range(&range) {
        Ok(logs) => logs,
        Err(err) => {
            tracing::error!(error = %err, "failed to read event logs, showing an empty report");
            Vec::new()
        }
    };
    let session_count = logs
        .iter()
        .filter(|log| range.contains(log) && filters.matches(&log.tag_path))
        .count();
    let points = aggregate(&logs, filters, &range);

    ReportData {
        generated_at,
        range,
        timezone: iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string()),
        filters: filters.iter().map(ToString::to_string).collect(),
        session_count,
        points,
    }
}

/// Writes the human-readable report with dates shown in `tz`.
pub fn write_report<W: Write, Tz: TimeZone>(
    writer: &mut W,
    data: &ReportData,
    tz: &Tz,
) -> Result<()>
where
    Tz::Offset: Display,
{
    writeln!(
        writer,
        "TIME REPORT: {} to {}",
        data.range.start.with_timezone(tz).format("%b %-d, %Y"),
        data.range.end.with_timezone(tz).format("%b %-d, %Y")
    )?;
    if !data.filters.is_empty() {
        writeln!(writer, "Filters: {}", data.filters.join(", "))?;
    }

    if data.points.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "No sessions recorded in this period.")?;
        if !data.filters.is_empty() {
            writeln!(writer)?;
            writeln!(writer, "Hint: Run without --filter to include every tag.")?;
        }
        return Ok(());
    }

    let mut rows = Vec::new();
    collect_rows(&data.points, 0, &mut rows);
    let width = rows
        .iter()
        .map(|(label, _)| label.chars().count())
        .max()
        .unwrap_or(0)
        .max(NAME_WIDTH);
    let max_root = data
        .points
        .iter()
        .map(|point| point.duration_secs)
        .max()
        .unwrap_or(0);

    writeln!(writer)?;
    writeln!(writer, "BY TAG")?;
    writeln!(writer, "──────")?;
    for (label, secs) in &rows {
        writeln!(
            writer,
            "{label:<width$}  {:>8}  {}",
            format_duration(*secs),
            progress_bar(*secs, max_root)
        )?;
    }

    writeln!(writer)?;
    writeln!(writer, "SUMMARY")?;
    writeln!(writer, "───────")?;
    writeln!(
        writer,
        "Total tracked:  {}",
        format_duration(total_duration(&data.points))
    )?;
    writeln!(writer, "Sessions:       {}", data.session_count)?;
    Ok(())
}

fn collect_rows(points: &[ReportDataPoint], depth: usize, rows: &mut Vec<(String, i64)>) {
    for point in points {
        rows.push((
            format!("{}{}", "  ".repeat(depth), point.name()),
            point.duration_secs,
        ));
        collect_rows(&point.children, depth + 1, rows);
    }
}

// ========== JSON Output ==========

/// JSON report structure.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub generated_at: String,
    pub timezone: &'a str,
    pub period: JsonPeriod,
    pub filters: &'a [String],
    pub total_secs: i64,
    pub session_count: usize,
    pub tags: &'a [ReportDataPoint],
}

#[derive(Debug, Serialize)]
pub struct JsonPeriod {
    pub start: String,
    pub end: String,
}

/// Formats report data as JSON.
pub fn format_report_json(data: &ReportData) -> Result<String> {
    let report = JsonReport {
        generated_at: data
            .generated_at
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        timezone: &data.timezone,
        period: JsonPeriod {
            start: data.range.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            end: data.range.end.to_rfc3339_opts(SecondsFormat::Secs, true),
        },
        filters: &data.filters,
        total_secs: total_duration(&data.points),
        session_count: data.session_count,
        tags: &data.points,
    };

    Ok(serde_json::to_string_pretty(&report)?)
}

// ========== Public Interface ==========

/// Runs the report command.
pub fn run<W: Write>(writer: &mut W, args: &ReportArgs, config: &Config) -> Result<()> {
    let now = Utc::now();
    let range = resolve_range(args, config.report_days, now)?;
    let filters: FilterSet = args
        .filters
        .iter()
        .map(|pattern| TagFilter::parse_pattern(pattern))
        .collect();
    tracing::debug!(?range, filters = filters.len(), "building report");

    let db = open_database(config)?;
    let data = generate_report_data(&db, range, &filters, now);

    if args.json {
        writeln!(writer, "{}", format_report_json(&data)?)?;
    } else {
        write_report(writer, &data, &Local)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use insta::assert_snapshot;
    use ptt_core::EventLog;
    use uuid::Uuid;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, minute, 0).unwrap()
    }

    fn march() -> DateRange {
        DateRange::new(at(1, 0, 0), Utc.with_ymd_and_hms(2025, 3, 31, 23, 59, 59).unwrap())
    }

    fn session(tag_path: &str, start: DateTime<Utc>, minutes: i64) -> EventLog {
        EventLog {
            id: Uuid::new_v4(),
            calendar_event_id: "cal".to_string(),
            title: "Session".to_string(),
            start_date: start,
            end_date: start + Duration::minutes(minutes),
            completed_at: None,
            tag_path: tag_path.to_string(),
            tag_color: "blue".to_string(),
        }
    }

    fn sample_sessions() -> Vec<EventLog> {
        vec![
            session("Work > Meetings > Standup", at(10, 9, 0), 15),
            session("Work > Meetings", at(10, 10, 0), 45),
            session("Work > Calls", at(11, 14, 0), 30),
            session("Personal", at(12, 18, 0), 60),
            session("Personal", at(2, 18, 0) - Duration::days(5), 60),
        ]
    }

    fn seeded_db(temp: &tempfile::TempDir) -> Database {
        let db = Database::open(&temp.path().join("ptt.db")).unwrap();
        for log in sample_sessions() {
            db.insert_event_log(&log).unwrap();
        }
        db
    }

    fn render(data: &ReportData) -> String {
        let mut output = Vec::new();
        write_report(&mut output, data, &Utc).unwrap();
        String::from_utf8(output).unwrap()
    }

    fn data_from(sessions: &[EventLog], filters: &FilterSet) -> ReportData {
        let range = march();
        let session_count = sessions
            .iter()
            .filter(|log| range.contains(log) && filters.matches(&log.tag_path))
            .count();
        ReportData {
            generated_at: Utc.with_ymd_and_hms(2025, 4, 1, 12, 0, 0).unwrap(),
            range,
            timezone: "Europe/Berlin".to_string(),
            filters: filters.iter().map(ToString::to_string).collect(),
            session_count,
            points: aggregate(sessions, filters, &range),
        }
    }

    // ========== Progress Bar Tests ==========

    #[test]
    fn test_progress_bar_full() {
        assert_eq!(progress_bar(100, 100), "██████████");
    }

    #[test]
    fn test_progress_bar_partial() {
        assert_eq!(progress_bar(50, 100), "█████░░░░░");
        assert_eq!(progress_bar(80, 100), "████████░░");
        assert_eq!(progress_bar(20, 100), "██░░░░░░░░");
    }

    #[test]
    fn test_progress_bar_minimum() {
        // <5% should get single block for visibility
        assert_eq!(progress_bar(4, 100), "█░░░░░░░░░");
        assert_eq!(progress_bar(1, 100), "█░░░░░░░░░");
    }

    #[test]
    fn test_progress_bar_zero() {
        assert_eq!(progress_bar(0, 0), "░░░░░░░░░░");
        assert_eq!(progress_bar(0, 100), "░░░░░░░░░░");
    }

    // ========== Range Tests ==========

    fn args(from: Option<&str>, to: Option<&str>) -> ReportArgs {
        ReportArgs {
            from: from.map(str::to_string),
            to: to.map(str::to_string),
            filters: vec![],
            json: false,
        }
    }

    #[test]
    fn test_default_range_ends_now() {
        let now = at(20, 12, 0);
        let range = resolve_range(&args(None, None), 30, now).unwrap();
        assert_eq!(range.end, now);
        assert_eq!(range.start, now - Duration::days(30));
    }

    #[test]
    fn test_huge_report_days_is_an_error() {
        let err = resolve_range(&args(None, None), u32::MAX, at(20, 12, 0)).unwrap_err();
        assert!(err.to_string().contains("report_days"));
    }

    #[test]
    fn test_explicit_range() {
        let range = resolve_range(
            &args(Some("2025-03-01T00:00:00Z"), Some("2025-03-02T00:00:00Z")),
            30,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(range, DateRange::new(at(1, 0, 0), at(2, 0, 0)));
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let err = resolve_range(
            &args(Some("2025-03-02T00:00:00Z"), Some("2025-03-01T00:00:00Z")),
            30,
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "--from must not be after --to");
    }

    // ========== Rendering Tests (Snapshot) ==========

    #[test]
    fn test_report_tree() {
        let data = data_from(&sample_sessions(), &FilterSet::new());
        assert_snapshot!(render(&data), @r"
        TIME REPORT: Mar 1, 2025 to Mar 31, 2025

        BY TAG
        ──────
        Personal                     1h 0m  ███████░░░
        Work                        1h 30m  ██████████
          Calls                     0h 30m  ███░░░░░░░
          Meetings                   1h 0m  ███████░░░
            Standup                 0h 15m  ██░░░░░░░░

        SUMMARY
        ───────
        Total tracked:  2h 30m
        Sessions:       4
        ");
    }

    #[test]
    fn test_report_with_filters() {
        let filters: FilterSet = [TagFilter::parse_pattern("Work > (Meetings|Calls)")]
            .into_iter()
            .collect();
        let data = data_from(&sample_sessions(), &filters);
        assert_snapshot!(render(&data), @r"
        TIME REPORT: Mar 1, 2025 to Mar 31, 2025
        Filters: Work > (Meetings|Calls)

        BY TAG
        ──────
        Work                        1h 30m  ██████████
          Calls                     0h 30m  ███░░░░░░░
          Meetings                   1h 0m  ███████░░░
            Standup                 0h 15m  ██░░░░░░░░

        SUMMARY
        ───────
        Total tracked:  1h 30m
        Sessions:       3
        ");
    }

    #[test]
    fn test_report_empty_period() {
        let data = data_from(&[], &FilterSet::new());
        assert_snapshot!(render(&data), @r"
        TIME REPORT: Mar 1, 2025 to Mar 31, 2025

        No sessions recorded in this period.
        ");
    }

    #[test]
    fn test_report_empty_with_filter_hint() {
        let filters: FilterSet = [TagFilter::parse_pattern("Nothing")].into_iter().collect();
        let data = data_from(&sample_sessions(), &filters);
        assert_snapshot!(render(&data), @r"
        TIME REPORT: Mar 1, 2025 to Mar 31, 2025
        Filters: Nothing

        No sessions recorded in this period.

        Hint: Run without --filter to include every tag.
        ");
    }

    #[test]
    fn test_report_json_output() {
        let filters: FilterSet = [TagFilter::parse_pattern("Work > (Meetings|Calls)")]
            .into_iter()
            .collect();
        let data = data_from(&[session("Work > Calls", at(11, 14, 0), 30)], &filters);
        let output = format_report_json(&data).unwrap();
        assert_snapshot!(output, @r#"
        {
          "generated_at": "2025-04-01T12:00:00Z",
          "timezone": "Europe/Berlin",
          "period": {
            "start": "2025-03-01T00:00:00Z",
            "end": "2025-03-31T23:59:59Z"
          },
          "filters": [
            "Work > (Meetings|Calls)"
          ],
          "total_secs": 1800,
          "session_count": 1,
          "tags": [
            {
              "tag_path": "Work",
              "duration_secs": 1800,
              "children": [
                {
                  "tag_path": "Work > Calls",
                  "duration_secs": 1800
                }
              ]
            }
          ]
        }
        "#);
    }

    // ========== Storage Tests ==========

    #[test]
    fn test_generate_reads_range_from_storage() {
        let temp = tempfile::tempdir().unwrap();
        let db = seeded_db(&temp);
        let data = generate_report_data(&db, march(), &FilterSet::new(), Utc::now());

        assert_eq!(data.session_count, 4);
        assert_eq!(total_duration(&data.points), 9000);
    }

    #[test]
    fn test_storage_failure_gives_empty_report() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("ptt.db");
        let db = Database::open(&db_path).unwrap();
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        conn.execute(
            "INSERT INTO event_logs VALUES (?, 'c', 't', 'garbage', '2025-03-10T00:00:00.000Z', NULL, 'Work', 'blue')",
            [Uuid::new_v4().to_string()],
        )
        .unwrap();

        let data = generate_report_data(&db, march(), &FilterSet::new(), Utc::now());
        assert!(data.points.is_empty());
        assert_eq!(data.session_count, 0);
    }
}
