//! Storage layer for the personal time tracker.
//!
//! Persists the tag tree, logged sessions, and which tags are collapsed in
//! tree views, using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization.
//!
//! # Schema
//!
//! ## Tag Order
//!
//! Tags are stored one row per tag with a `parent_id` reference and an explicit
//! `idx` sibling position. Row order is never relied upon: [`Database::load_tags`]
//! rebuilds the tree and sorts every sibling list by `idx`.
//!
//! Tag edits are applied to an in-memory [`TagTree`] and written back with
//! [`Database::replace_tags`], which swaps the whole table in one transaction.
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 UTC with millisecond precision
//! (e.g., `2024-01-15T10:30:00.000Z`), so lexicographic ordering matches
//! chronological ordering and range filters can run in SQL.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use ptt_core::{Color, DateRange, EventLog, TagNode, TagTree};
use rusqlite::{Connection, OptionalExtension, Params, params};
use thiserror::Error;
use uuid::Uuid;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored identifier is not a UUID.
    #[error("invalid id in {table}: {value}")]
    InvalidId {
        table: &'static str,
        value: String,
        #[source]
        source: uuid::Error,
    },
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for event log {log_id}: {timestamp}")]
    TimestampParse {
        log_id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A `tags` row before tree assembly.
struct TagRow {
    id: String,
    parent_id: Option<String>,
    name: String,
    color: String,
    idx: i64,
}

/// An `event_logs` row before timestamp parsing.
struct EventLogRow {
    id: String,
    calendar_event_id: String,
    title: String,
    start_date: String,
    end_date: String,
    completed_at: Option<String>,
    tag_path: String,
    tag_color: String,
}

impl EventLogRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            calendar_event_id: row.get(1)?,
            title: row.get(2)?,
            start_date: row.get(3)?,
            end_date: row.get(4)?,
            completed_at: row.get(5)?,
            tag_path: row.get(6)?,
            tag_color: row.get(7)?,
        })
    }

    fn into_event_log(self) -> Result<EventLog, DbError> {
        let start_date = parse_timestamp(&self.start_date, &self.id)?;
        let end_date = parse_timestamp(&self.end_date, &self.id)?;
        let completed_at = self
            .completed_at
            .as_deref()
            .map(|ts| parse_timestamp(ts, &self.id))
            .transpose()?;
        Ok(EventLog {
            id: parse_id(&self.id, "event_logs")?,
            calendar_event_id: self.calendar_event_id,
            title: self.title,
            start_date,
            end_date,
            completed_at,
            tag_path: self.tag_path,
            tag_color: self.tag_color,
        })
    }
}

const EVENT_LOG_COLUMNS: &str =
    "id, calendar_event_id, title, start_date, end_date, completed_at, tag_path, tag_color";

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            -- Tags table: one row per tag, idx orders siblings
            CREATE TABLE IF NOT EXISTS tags (
                id TEXT PRIMARY KEY,
                parent_id TEXT,
                name TEXT NOT NULL,
                color TEXT NOT NULL,
                idx INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (parent_id) REFERENCES tags(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_tags_parent ON tags(parent_id, idx);

            -- Event logs: tagged sessions
            -- start_date/end_date: RFC 3339 UTC (e.g., '2024-01-15T10:30:00.000Z')
            CREATE TABLE IF NOT EXISTS event_logs (
                id TEXT PRIMARY KEY,
                calendar_event_id TEXT NOT NULL,
                title TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                completed_at TEXT,
                tag_path TEXT NOT NULL,
                tag_color TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_event_logs_start ON event_logs(start_date);
            CREATE INDEX IF NOT EXISTS idx_event_logs_end ON event_logs(end_date);

            -- Tree view state, kept apart from tags so imports do not reset it
            CREATE TABLE IF NOT EXISTS collapsed_tags (
                tag_id TEXT PRIMARY KEY
            );
            ",
        )?;
        Ok(())
    }

    // ========== Tags ==========

    /// Loads the tag tree with every sibling list in `idx` order.
    ///
    /// Rows whose parent no longer exists are skipped.
    pub fn load_tags(&self) -> Result<TagTree, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, parent_id, name, color, idx
            FROM tags
            ORDER BY idx ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(TagRow {
                id: row.get(0)?,
                parent_id: row.get(1)?,
                name: row.get(2)?,
                color: row.get(3)?,
                idx: row.get(4)?,
            })
        })?;

        let mut by_parent: HashMap<Option<String>, Vec<TagRow>> = HashMap::new();
        let mut total = 0usize;
        for row in rows {
            let row = row?;
            total += 1;
            by_parent.entry(row.parent_id.clone()).or_default().push(row);
        }

        let roots = build_level(None, &mut by_parent)?;
        let mut tree = TagTree::new(roots);
        tree.normalize();

        let loaded = tree.len();
        if loaded < total {
            tracing::warn!(skipped = total - loaded, "skipped unreachable tag rows");
        }
        tracing::debug!(tags = loaded, "loaded tags");
        Ok(tree)
    }

    /// Replaces every stored tag with `tree`.
    pub fn replace_tags(&mut self, tree: &TagTree) -> Result<usize, DbError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM tags", [])?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO tags (id, parent_id, name, color, idx)
                VALUES (?, ?, ?, ?, ?)
                ",
            )?;
            // Parents are written before their children to satisfy the foreign key.
            let mut pending: Vec<(&TagNode, Option<String>)> =
                tree.roots().iter().rev().map(|root| (root, None)).collect();
            while let Some((node, parent_id)) = pending.pop() {
                let id = node.id.to_string();
                inserted += stmt.execute(params![
                    id,
                    parent_id,
                    node.name,
                    node.color.name(),
                    node.index,
                ])?;
                pending.extend(
                    node.children
                        .iter()
                        .rev()
                        .map(|child| (child, Some(id.clone()))),
                );
            }
        }
        tx.commit()?;
        tracing::debug!(tags = inserted, "replaced tags");
        Ok(inserted)
    }

    /// Ids of tags collapsed in tree views.
    ///
    /// Unparseable ids are ignored.
    pub fn collapsed_tags(&self) -> Result<HashSet<Uuid>, DbError> {
        let mut stmt = self.conn.prepare("SELECT tag_id FROM collapsed_tags")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut ids = HashSet::new();
        for row in rows {
            let value = row?;
            match Uuid::parse_str(&value) {
                Ok(id) => {
                    ids.insert(id);
                }
                Err(err) => tracing::debug!(%err, value = %value, "ignoring collapsed tag id"),
            }
        }
        Ok(ids)
    }

    /// Marks a tag as collapsed or expanded.
    pub fn set_collapsed(&self, id: Uuid, collapsed: bool) -> Result<(), DbError> {
        let id = id.to_string();
        if collapsed {
            self.conn.execute(
                "INSERT OR IGNORE INTO collapsed_tags (tag_id) VALUES (?)",
                [id],
            )?;
        } else {
            self.conn
                .execute("DELETE FROM collapsed_tags WHERE tag_id = ?", [id])?;
        }
        Ok(())
    }

    // ========== Event Logs ==========

    /// Stores a new event log.
    pub fn insert_event_log(&self, log: &EventLog) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO event_logs
            (id, calendar_event_id, title, start_date, end_date, completed_at, tag_path, tag_color)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                log.id.to_string(),
                log.calendar_event_id,
                log.title,
                format_timestamp(log.start_date),
                format_timestamp(log.end_date),
                log.completed_at.map(format_timestamp),
                log.tag_path,
                log.tag_color,
            ],
        )?;
        Ok(())
    }

    /// Overwrites an existing event log. Returns `false` if no log has this id.
    pub fn update_event_log(&self, log: &EventLog) -> Result<bool, DbError> {
        let updated = self.conn.execute(
            "
            UPDATE event_logs
            SET calendar_event_id = ?, title = ?, start_date = ?, end_date = ?,
                completed_at = ?, tag_path = ?, tag_color = ?
            WHERE id = ?
            ",
            params![
                log.calendar_event_id,
                log.title,
                format_timestamp(log.start_date),
                format_timestamp(log.end_date),
                log.completed_at.map(format_timestamp),
                log.tag_path,
                log.tag_color,
                log.id.to_string(),
            ],
        )?;
        Ok(updated > 0)
    }

    /// Deletes an event log. Returns `false` if no log has this id.
    pub fn delete_event_log(&self, id: Uuid) -> Result<bool, DbError> {
        let deleted = self
            .conn
            .execute("DELETE FROM event_logs WHERE id = ?", [id.to_string()])?;
        Ok(deleted > 0)
    }

    /// Fetches one event log by id.
    pub fn get_event_log(&self, id: Uuid) -> Result<Option<EventLog>, DbError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {EVENT_LOG_COLUMNS} FROM event_logs WHERE id = ?"),
                [id.to_string()],
                EventLogRow::from_row,
            )
            .optional()?;
        row.map(EventLogRow::into_event_log).transpose()
    }

    /// Lists all event logs, most recent start first.
    pub fn list_event_logs(&self) -> Result<Vec<EventLog>, DbError> {
        self.query_event_logs(
            &format!(
                "SELECT {EVENT_LOG_COLUMNS} FROM event_logs ORDER BY start_date DESC, id ASC"
            ),
            [],
        )
    }

    /// Lists event logs lying entirely inside `range`, most recent start first.
    ///
    /// Both bounds are inclusive: a log qualifies when it starts at or after
    /// `range.start` and ends at or before `range.end`.
    pub fn list_event_logs_in_range(&self, range: &DateRange) -> Result<Vec<EventLog>, DbError> {
        self.query_event_logs(
            &format!(
                "
                SELECT {EVENT_LOG_COLUMNS}
                FROM event_logs
                WHERE start_date >= ? AND end_date <= ?
                ORDER BY start_date DESC, id ASC
                "
            ),
            [format_timestamp(range.start), format_timestamp(range.end)],
        )
    }

    fn query_event_logs<P: Params>(&self, sql: &str, params: P) -> Result<Vec<EventLog>, DbError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, EventLogRow::from_row)?;
        let mut logs = Vec::new();
        for row in rows {
            logs.push(row?.into_event_log()?);
        }
        Ok(logs)
    }
}

/// Assembles the children of `parent` from the grouped rows.
///
/// Each group is taken out of the map as it is visited, so a parent cycle in
/// corrupt data is never reached from the roots and cannot recurse forever.
fn build_level(
    parent: Option<&str>,
    by_parent: &mut HashMap<Option<String>, Vec<TagRow>>,
) -> Result<Vec<TagNode>, DbError> {
    let Some(rows) = by_parent.remove(&parent.map(str::to_string)) else {
        return Ok(Vec::new());
    };
    rows.into_iter()
        .map(|row| {
            let id = parse_id(&row.id, "tags")?;
            let mut node = TagNode::with_id(id, row.name, Color::parse_or_default(&row.color));
            node.index = u32::try_from(row.idx).unwrap_or(u32::MAX);
            node.children = build_level(Some(&row.id), by_parent)?;
            Ok(node)
        })
        .collect()
}

fn parse_id(value: &str, table: &'static str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|source| DbError::InvalidId {
        table,
        value: value.to_string(),
        source,
    })
}

fn parse_timestamp(timestamp: &str, log_id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            log_id: log_id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
