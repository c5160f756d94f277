//! Tag path filters for reports.
//!
//! Two pattern forms are understood:
//!
//! - `Work > Meetings` matches exactly that path.
//! - `Work > (Meetings|Calls)` matches any path under `Work` that contains
//!   `Meetings` or `Calls` as a segment.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::path;

/// A single report filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagFilter {
    /// Matches paths with exactly these segments.
    Exact { path: Vec<String> },
    /// Matches paths starting with `base` that contain any alternative.
    Optional {
        base: Vec<String>,
        alternatives: Vec<String>,
    },
}

impl TagFilter {
    /// An exact filter. An empty `path` is stored as a single empty segment.
    pub fn exact<S: Into<String>>(path: impl IntoIterator<Item = S>) -> Self {
        let mut path: Vec<String> = path.into_iter().map(Into::into).collect();
        if path.is_empty() {
            path.push(String::new());
        }
        Self::Exact { path }
    }

    /// An alternation filter. Without any alternative it degrades to an exact
    /// filter on `base`.
    pub fn optional<S: Into<String>, T: Into<String>>(
        base: impl IntoIterator<Item = S>,
        alternatives: impl IntoIterator<Item = T>,
    ) -> Self {
        let base: Vec<String> = base.into_iter().map(Into::into).collect();
        let alternatives: Vec<String> = alternatives
            .into_iter()
            .map(Into::into)
            .filter(|alt: &String| !alt.is_empty())
            .collect();
        if alternatives.is_empty() {
            Self::exact(base)
        } else {
            Self::Optional { base, alternatives }
        }
    }

    /// Parses `a > b > c` or `a > (x|y)`.
    ///
    /// Never fails: anything that is not an alternation group in the last
    /// position is read as an exact path.
    pub fn parse_pattern(pattern: &str) -> Self {
        let mut segments = path::segments(pattern);
        let group = segments
            .last()
            .copied()
            .and_then(|last| last.strip_prefix('('))
            .and_then(|last| last.strip_suffix(')'));

        match group {
            Some(group) => {
                let alternatives: Vec<&str> = group.split('|').collect();
                segments.pop();
                Self::optional(segments, alternatives)
            }
            None => Self::exact(segments),
        }
    }

    /// Whether `tag_path` satisfies this filter.
    pub fn matches(&self, tag_path: &str) -> bool {
        let candidate = path::segments(tag_path);
        match self {
            Self::Exact { path } => {
                path.len() == candidate.len()
                    && path.iter().zip(&candidate).all(|(want, got)| want == got)
            }
            Self::Optional { base, alternatives } => {
                base.len() <= candidate.len()
                    && base.iter().zip(&candidate).all(|(want, got)| want == got)
                    && alternatives
                        .iter()
                        .any(|alt| candidate.contains(&alt.as_str()))
            }
        }
    }
}

impl FromStr for TagFilter {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_pattern(s))
    }
}

impl fmt::Display for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact { path: segments } => f.write_str(&path::join(segments)),
            Self::Optional { base, alternatives } => {
                if !base.is_empty() {
                    write!(f, "{}{}", path::join(base), path::DELIMITER)?;
                }
                write!(f, "({})", alternatives.join("|"))
            }
        }
    }
}

/// The filters active for one report session.
///
/// A path passes when any filter matches it; an empty set passes everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    filters: Vec<TagFilter>,
}

impl FilterSet {
    pub const fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Adds a filter; returns `false` if an equal one is already active.
    pub fn insert(&mut self, filter: TagFilter) -> bool {
        if self.filters.contains(&filter) {
            return false;
        }
        self.filters.push(filter);
        true
    }

    /// Removes a filter; returns `false` if it was not active.
    pub fn remove(&mut self, filter: &TagFilter) -> bool {
        let before = self.filters.len();
        self.filters.retain(|active| active != filter);
        self.filters.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TagFilter> {
        self.filters.iter()
    }

    pub fn matches(&self, tag_path: &str) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|filter| filter.matches(tag_path))
    }
}

impl FromIterator<TagFilter> for FilterSet {
    fn from_iter<I: IntoIterator<Item = TagFilter>>(iter: I) -> Self {
        let mut set = Self::new();
        for filter in iter {
            set.insert(filter);
        }
        set
    }
}
