//! Indented outline format for tag trees.
//!
//! One tag per line, two spaces per depth level:
//!
//! ```text
//! - Work (8CAAEE2B-0C1D-4F5A-9C39-6A1E0D8B7F10; blue)
//!   - Meetings (0F6B2C4E-5A7D-4E8B-A1C2-3D4E5F6A7B8C; green)
//! ```
//!
//! Parsing is total: a line that cannot be read as `name (uuid; color)` still
//! produces a tag, with a fresh id and the default color filling the gaps.
//! This keeps hand-edited outlines importable.

use std::collections::HashSet;
use std::fmt::Write;

use uuid::Uuid;

use crate::color::Color;
use crate::tag::{TagNode, sorted_by_index};

/// Leading spaces per depth level.
const INDENT_WIDTH: usize = 2;

/// Item marker written before every name.
const MARKER: &str = "- ";

/// Parses an outline into root tags.
///
/// Blank lines are ignored. A line indented deeper than its predecessor
/// becomes its child; a line at the same or shallower depth closes every
/// open tag at that depth or deeper. A first line with leading indentation
/// is still a root. An id already used earlier in the text is replaced with
/// a fresh one.
///
/// Sibling indices come from per-depth counters. A line that follows a
/// deeper line restarts the counter of its own depth and drops the deeper
/// ones, so `E` in `- A / - B / - E` with `B` nested under `A` gets index 0.
/// Use [`TagTree::renumber`](crate::TagTree::renumber) to turn the result
/// into dense indices in line order.
pub fn parse(text: &str) -> Vec<TagNode> {
    let mut roots = Vec::new();
    let mut open: Vec<(TagNode, usize)> = Vec::new();
    let mut seen = HashSet::new();
    let mut counters = DepthCounters::default();

    for (line_idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let depth = line.chars().take_while(|c| *c == ' ').count() / INDENT_WIDTH;

        while open.last().is_some_and(|(_, top)| *top >= depth) {
            if let Some((done, _)) = open.pop() {
                attach(&mut open, &mut roots, done);
            }
        }

        let mut node = parse_line(line.trim(), line_idx + 1);
        if !seen.insert(node.id) {
            tracing::debug!(line = line_idx + 1, id = %node.id, "duplicate tag id, generating one");
            node.id = Uuid::new_v4();
            seen.insert(node.id);
        }
        node.index = counters.next(depth);
        open.push((node, depth));
    }

    while let Some((done, _)) = open.pop() {
        attach(&mut open, &mut roots, done);
    }

    tracing::debug!(roots = roots.len(), "parsed outline");
    roots
}

fn attach(open: &mut [(TagNode, usize)], roots: &mut Vec<TagNode>, node: TagNode) {
    match open.last_mut() {
        Some((parent, _)) => parent.children.push(node),
        None => roots.push(node),
    }
}

/// Sibling counters indexed by indent depth.
#[derive(Debug, Default)]
struct DepthCounters {
    counts: Vec<u32>,
    last_depth: Option<usize>,
}

impl DepthCounters {
    fn next(&mut self, depth: usize) -> u32 {
        if self.last_depth.is_some_and(|last| last > depth) {
            self.counts.truncate(depth);
        }
        if self.counts.len() <= depth {
            self.counts.resize(depth + 1, 0);
        }
        self.last_depth = Some(depth);
        let index = self.counts[depth];
        self.counts[depth] += 1;
        index
    }
}

/// Reads one trimmed line: `["- "] name ["(" uuid [";" color] ")"]`.
fn parse_line(content: &str, line_no: usize) -> TagNode {
    let content = content
        .strip_prefix(MARKER)
        .map_or(content, str::trim_start);

    let Some(annotated) = split_annotation(content) else {
        return TagNode::new(content.trim(), Color::default());
    };

    let id = Uuid::parse_str(annotated.id.trim()).unwrap_or_else(|_| {
        tracing::debug!(line = line_no, id = annotated.id, "unparseable tag id, generating one");
        Uuid::new_v4()
    });
    let color = annotated
        .color
        .map_or_else(Color::default, Color::parse_or_default);

    TagNode::with_id(id, annotated.name, color)
}

/// The pieces of `name (id; color)`.
#[derive(Debug, PartialEq, Eq)]
struct Annotated<'a> {
    name: &'a str,
    id: &'a str,
    color: Option<&'a str>,
}

/// Splits off the trailing `( … )` group.
///
/// Returns `None` when the line does not end in a well-formed group, in
/// which case the whole line is the name.
fn split_annotation(content: &str) -> Option<Annotated<'_>> {
    let inner_end = content.strip_suffix(')')?;
    let open = inner_end.rfind('(')?;
    let inner = &inner_end[open + 1..];
    if inner.contains(')') {
        return None;
    }
    let name = inner_end[..open].trim();
    if name.is_empty() {
        return None;
    }
    let (id, color) = match inner.split_once(';') {
        Some((id, color)) => (id, Some(color.trim())),
        None => (inner, None),
    };
    Some(Annotated { name, id, color })
}

/// Renders tags as an outline, siblings in index order.
pub fn export(roots: &[TagNode]) -> String {
    fn visit(node: &TagNode, depth: usize, out: &mut String) {
        out.push_str(&" ".repeat(depth * INDENT_WIDTH));
        out.push_str(MARKER);
        let _ = writeln!(out, "{} ({:X}; {})", node.name, node.id, node.color);
        for child in node.sorted_children() {
            visit(child, depth + 1, out);
        }
    }

    let mut out = String::new();
    for root in sorted_by_index(roots) {
        visit(root, 0, &mut out);
    }
    out
}
