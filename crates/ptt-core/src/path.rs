//! Tag path strings.
//!
//! A tag path is the chain of ancestor names from a root tag down to a tag,
//! joined with [`DELIMITER`]: `Work > Meetings > Standup`. Paths are the
//! addressing scheme for filters and report rollups; two tags with the same
//! name chain share a path.

/// Separator between path segments.
pub const DELIMITER: &str = " > ";

/// Splits a path into its segments.
///
/// The empty path has a single empty segment, matching `str::split`.
pub fn segments(path: &str) -> Vec<&str> {
    path.split(DELIMITER).collect()
}

/// Joins segments into a path.
pub fn join<S: AsRef<str>>(segments: &[S]) -> String {
    let mut path = String::new();
    for (idx, segment) in segments.iter().enumerate() {
        if idx > 0 {
            path.push_str(DELIMITER);
        }
        path.push_str(segment.as_ref());
    }
    path
}

/// Every ancestor prefix of `path`, shortest first, ending with `path` itself.
pub fn prefixes(path: &str) -> Vec<&str> {
    let mut out: Vec<&str> = path
        .match_indices(DELIMITER)
        .map(|(end, _)| &path[..end])
        .collect();
    out.push(path);
    out
}

/// The path with its last segment removed, or `None` for a single segment.
pub fn parent(path: &str) -> Option<&str> {
    path.rfind(DELIMITER).map(|end| &path[..end])
}

/// The last segment of the path.
pub fn leaf(path: &str) -> &str {
    path.rfind(DELIMITER)
        .map_or(path, |end| &path[end + DELIMITER.len()..])
}

/// Number of segments in the path.
pub fn depth(path: &str) -> usize {
    path.matches(DELIMITER).count() + 1
}
