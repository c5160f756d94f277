//! Core domain logic for the personal time tracker.
//!
//! This crate contains the tag hierarchy engine:
//! - Tag tree: the ordered tag taxonomy and its edit operations
//! - Outline: the indented plain-text import/export format
//! - Filter: tag path patterns used to narrow reports
//! - Report: duration rollups of logged sessions by tag path prefix
//!
//! Everything here is synchronous and free of I/O; storage lives in `ptt-db`.

pub mod color;
pub mod filter;
pub mod outline;
pub mod path;
pub mod report;
pub mod tag;

pub use color::{Color, UnknownColor};
pub use filter::{FilterSet, TagFilter};
pub use report::{
    DateRange, EventLog, ReportDataPoint, aggregate, format_duration, total_duration,
};
pub use tag::{FlatTag, IndexEntry, TagError, TagIndex, TagNode, TagTree, validate_name};
