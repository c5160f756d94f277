//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use ptt_core::TagTree;
use regex::Regex;
use uuid::Uuid;

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s+(minute|hour|day|week)s?\s+ago$").unwrap_or_else(|err| {
        unreachable!("relative time pattern is valid: {err}")
    })
});

/// Conservative bounds for relative time parsing (~1000 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 1000 * 365 * 24 * 60;

/// Which end of a range a date-only bound stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayEdge {
    /// Local midnight at the start of the day.
    Start,
    /// The last millisecond of the day.
    End,
}

/// Parse a datetime string as RFC 3339, relative time, or `now`.
///
/// Supports:
/// - RFC 3339: "2026-01-15T10:30:00Z"
/// - Relative: "2 hours ago", "30 minutes ago", "1 day ago", "1 week ago"
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if s.eq_ignore_ascii_case("now") {
        return Ok(Utc::now());
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        bail!(
            "Invalid datetime: {s}. Use RFC 3339 (e.g., 2026-01-15T10:30:00Z), a date (2026-01-15) or relative (e.g., '2 hours ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let (max_for_unit, minutes_per_unit) = match &caps[2] {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        "week" => (MAX_RELATIVE_MINUTES / (60 * 24 * 7), 60 * 24 * 7),
        unit => bail!("Unknown time unit: {unit}"),
    };

    if n > max_for_unit {
        bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    let duration = Duration::minutes(n * minutes_per_unit);
    Ok(Utc::now() - duration)
}

/// Parse a report bound. A bare `YYYY-MM-DD` date is read in local time and
/// resolved to the start or end of that day.
pub fn parse_bound(s: &str, edge: DayEdge) -> Result<DateTime<Utc>> {
    let Ok(date) = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") else {
        return parse_datetime(s);
    };
    match edge {
        DayEdge::Start => local_midnight_to_utc(date),
        DayEdge::End => {
            let next = date.succ_opt().context("date out of range")?;
            Ok(local_midnight_to_utc(next)? - Duration::milliseconds(1))
        }
    }
}

/// Converts a local date at midnight to UTC.
/// Handles DST ambiguity by picking the earlier time; a midnight lost to a
/// spring-forward gap falls back to 1am.
fn local_midnight_to_utc(date: NaiveDate) -> Result<DateTime<Utc>> {
    for hour in [0, 1] {
        let Some(naive) = date.and_hms_opt(hour, 0, 0) else {
            continue;
        };
        if let Some(local) = Local.from_local_datetime(&naive).earliest() {
            return Ok(local.with_timezone(&Utc));
        }
    }
    bail!("no local midnight on {date}")
}

/// Resolves a tag reference given as a UUID or a full tag path.
pub fn resolve_tag(tree: &TagTree, reference: &str) -> Result<Uuid> {
    let reference = reference.trim();
    if let Ok(id) = Uuid::parse_str(reference) {
        if tree.find(id).is_some() {
            return Ok(id);
        }
        bail!("tag not found: {id}");
    }
    tree.find_by_path(reference)
        .map(|node| node.id)
        .with_context(|| format!("tag not found: {reference}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use ptt_core::Color;

    #[test]
    fn parses_rfc3339() {
        let dt = parse_datetime("2026-01-15T10:30:00+02:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2026, 1, 15, 8, 30, 0).unwrap());
    }

    #[test]
    fn parses_relative_time() {
        let before = Utc::now();
        let dt = parse_datetime("2 hours ago").unwrap();
        let elapsed = before - dt;
        assert!(elapsed >= Duration::minutes(119) && elapsed <= Duration::minutes(121));

        assert!(parse_datetime("1 week ago").is_ok());
        assert!(parse_datetime("30 minutes ago").is_ok());
    }

    #[test]
    fn rejects_garbage_and_overflow() {
        let err = parse_datetime("yesterday-ish").unwrap_err();
        assert!(err.to_string().contains("Invalid datetime"));

        let err = parse_datetime("99999999999 weeks ago").unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn date_bounds_cover_the_whole_local_day() {
        let start = parse_bound("2025-06-15", DayEdge::Start).unwrap();
        let end = parse_bound("2025-06-15", DayEdge::End).unwrap();

        assert_eq!(
            start.with_timezone(&Local).date_naive(),
            NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
        );
        assert_eq!(
            end.with_timezone(&Local).date_naive(),
            NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
        );
        assert_eq!(end - start, Duration::days(1) - Duration::milliseconds(1));
    }

    #[test]
    fn bounds_accept_full_timestamps() {
        let dt = parse_bound("2025-06-15T12:00:00Z", DayEdge::End).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap());
    }

    #[test]
    fn resolve_tag_by_id_or_path() {
        let mut tree = TagTree::default();
        let work = tree.add("Work", Color::Blue, None).unwrap();
        let meetings = tree.add("Meetings", Color::Green, Some(work)).unwrap();

        assert_eq!(resolve_tag(&tree, &work.to_string()).unwrap(), work);
        assert_eq!(resolve_tag(&tree, "Work > Meetings").unwrap(), meetings);

        let err = resolve_tag(&tree, "Work > Email").unwrap_err();
        assert_eq!(err.to_string(), "tag not found: Work > Email");
        assert!(resolve_tag(&tree, &Uuid::nil().to_string()).is_err());
    }
}
