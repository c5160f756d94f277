//! Duration rollups over logged sessions.
//!
//! Each session's duration is credited to its own tag path and to every
//! ancestor path, so `Work` totals everything logged under `Work > …`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::filter::FilterSet;
use crate::path;

/// A logged, tagged time session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    pub id: Uuid,
    /// Identifier of the calendar event this session was recorded against.
    pub calendar_event_id: String,
    pub title: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub tag_path: String,
    /// Color name of the tag at logging time.
    pub tag_color: String,
}

impl EventLog {
    /// Whole seconds between start and end; zero when the end precedes the start.
    pub fn duration_secs(&self) -> i64 {
        (self.end_date - self.start_date).num_seconds().max(0)
    }
}

/// A closed reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The `days` days ending at `now`, or `None` when the start would fall
    /// before the earliest representable time.
    pub fn last_days(now: DateTime<Utc>, days: u32) -> Option<Self> {
        let start = now.checked_sub_signed(chrono::Duration::days(i64::from(days)))?;
        Some(Self { start, end: now })
    }

    /// Whether the session lies entirely inside the window, bounds included.
    pub fn contains(&self, event: &EventLog) -> bool {
        event.start_date >= self.start && event.end_date <= self.end
    }
}

/// One node of a rollup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportDataPoint {
    pub tag_path: String,
    pub duration_secs: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ReportDataPoint>,
}

impl ReportDataPoint {
    /// The last segment of the tag path.
    pub fn name(&self) -> &str {
        path::leaf(&self.tag_path)
    }
}

/// Builds the rollup for the sessions inside `range` that pass `filters`.
///
/// Roots are single-segment paths; every level is ordered by tag path.
pub fn aggregate<'a>(
    events: impl IntoIterator<Item = &'a EventLog>,
    filters: &FilterSet,
    range: &DateRange,
) -> Vec<ReportDataPoint> {
    let mut totals: BTreeMap<&'a str, i64> = BTreeMap::new();
    let mut kept = 0usize;
    let mut skipped = 0usize;

    for event in events {
        if !range.contains(event) || !filters.matches(&event.tag_path) {
            skipped += 1;
            continue;
        }
        kept += 1;
        let duration = event.duration_secs();
        for prefix in path::prefixes(&event.tag_path) {
            *totals.entry(prefix).or_insert(0) += duration;
        }
    }
    tracing::debug!(kept, skipped, paths = totals.len(), "aggregated sessions");

    let mut children_of: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let mut roots = Vec::new();
    for &key in totals.keys() {
        match path::parent(key) {
            None => roots.push(key),
            Some(parent) => children_of.entry(parent).or_default().push(key),
        }
    }

    roots
        .into_iter()
        .map(|root| build_point(root, &totals, &children_of))
        .collect()
}

fn build_point(
    key: &str,
    totals: &BTreeMap<&str, i64>,
    children_of: &BTreeMap<&str, Vec<&str>>,
) -> ReportDataPoint {
    let children = children_of
        .get(key)
        .map(|keys| {
            keys.iter()
                .map(|child| build_point(child, totals, children_of))
                .collect()
        })
        .unwrap_or_default();
    ReportDataPoint {
        tag_path: key.to_string(),
        duration_secs: totals.get(key).copied().unwrap_or_default(),
        children,
    }
}

/// Sum of the root durations.
pub fn total_duration(points: &[ReportDataPoint]) -> i64 {
    points.iter().map(|point| point.duration_secs).sum()
}

/// Formats seconds as `Xh Ym`, flooring partial minutes.
/// Negative durations render as `0h 0m`.
pub fn format_duration(secs: i64) -> String {
    let total_minutes = secs.max(0) / 60;
    format!("{}h {}m", total_minutes / 60, total_minutes % 60)
}
