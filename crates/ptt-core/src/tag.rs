//! Tag tree model.
//!
//! Tags own their children; there are no parent back-references. Upward
//! walks (ancestor checks, parent lookup) go through a [`TagIndex`] built
//! from the tree on demand.
//!
//! Every sibling list carries an explicit `index` so order survives storage
//! layers that do not preserve row order. Edits through [`TagTree`] keep the
//! indices dense from zero and the `Vec` order in step with them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::color::Color;
use crate::path::{self, DELIMITER};

/// Errors from tag tree edits.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TagError {
    /// No tag with this id exists in the tree.
    #[error("tag not found: {0}")]
    NotFound(Uuid),

    /// The name cannot be used as a path segment.
    #[error("invalid tag name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// The move target is the tag itself or one of its descendants.
    #[error("cannot move tag {id} under {target}: target is inside the moved subtree")]
    InvalidMove { id: Uuid, target: Uuid },
}

/// A tag and its ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagNode {
    pub id: Uuid,
    pub name: String,
    pub color: Color,
    /// Position among siblings.
    pub index: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TagNode>,
}

impl TagNode {
    /// Creates a childless tag with a fresh id.
    pub fn new(name: impl Into<String>, color: Color) -> Self {
        Self::with_id(Uuid::new_v4(), name, color)
    }

    /// Creates a childless tag with the given id.
    pub fn with_id(id: Uuid, name: impl Into<String>, color: Color) -> Self {
        Self {
            id,
            name: name.into(),
            color,
            index: 0,
            children: Vec::new(),
        }
    }

    /// Children ordered by `index`.
    pub fn sorted_children(&self) -> Vec<&Self> {
        sorted_by_index(&self.children)
    }

    /// Number of tags in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Self::subtree_len).sum::<usize>()
    }
}

/// Returns `nodes` ordered by their sibling index.
pub(crate) fn sorted_by_index(nodes: &[TagNode]) -> Vec<&TagNode> {
    let mut sorted: Vec<&TagNode> = nodes.iter().collect();
    sorted.sort_by_key(|node| node.index);
    sorted
}

/// Checks that a name can stand as a tag path segment and returns it trimmed.
pub fn validate_name(name: &str) -> Result<String, TagError> {
    let trimmed = name.trim();
    let reason = if trimmed.is_empty() {
        Some("name cannot be empty")
    } else if trimmed.contains(DELIMITER) {
        Some("name cannot contain \" > \"")
    } else if trimmed.starts_with("> ") || trimmed.ends_with(" >") {
        Some("name cannot start or end with \">\"")
    } else if trimmed.contains(['\n', '\r']) {
        Some("name cannot span lines")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(TagError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(trimmed.to_string()),
    }
}

/// A tag visited by [`TagTree::flatten`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatTag<'a> {
    pub depth: usize,
    pub path: String,
    pub node: &'a TagNode,
}

/// Where a tag sits in its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub parent: Option<Uuid>,
    pub depth: usize,
}

/// Id lookup table for a tag tree.
///
/// Built from a snapshot of the tree; rebuild after edits.
#[derive(Debug, Clone, Default)]
pub struct TagIndex {
    entries: HashMap<Uuid, IndexEntry>,
}

impl TagIndex {
    /// Indexes every tag reachable from `roots`.
    pub fn build(roots: &[TagNode]) -> Self {
        let mut entries = HashMap::new();
        let mut stack: Vec<(&TagNode, Option<Uuid>, usize)> =
            roots.iter().map(|root| (root, None, 0)).collect();
        while let Some((node, parent, depth)) = stack.pop() {
            entries.insert(node.id, IndexEntry { parent, depth });
            stack.extend(
                node.children
                    .iter()
                    .map(|child| (child, Some(node.id), depth + 1)),
            );
        }
        Self { entries }
    }

    pub fn get(&self, id: Uuid) -> Option<IndexEntry> {
        self.entries.get(&id).copied()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parent of `id`; `None` for roots and unknown ids.
    pub fn parent(&self, id: Uuid) -> Option<Uuid> {
        self.get(id).and_then(|entry| entry.parent)
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: Uuid) -> Vec<Uuid> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(ancestor) = current {
            out.push(ancestor);
            current = self.parent(ancestor);
        }
        out
    }

    /// Whether `ancestor` lies strictly above `id`.
    pub fn is_ancestor(&self, ancestor: Uuid, id: Uuid) -> bool {
        self.ancestors(id).contains(&ancestor)
    }
}

/// An ordered forest of tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagTree {
    roots: Vec<TagNode>,
}

impl TagTree {
    pub const fn new(roots: Vec<TagNode>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[TagNode] {
        &self.roots
    }

    pub fn into_roots(self) -> Vec<TagNode> {
        self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total number of tags.
    pub fn len(&self) -> usize {
        self.roots.iter().map(TagNode::subtree_len).sum()
    }

    pub fn index(&self) -> TagIndex {
        TagIndex::build(&self.roots)
    }

    pub fn find(&self, id: Uuid) -> Option<&TagNode> {
        find_in(&self.roots, id)
    }

    /// First tag whose name chain equals `tag_path`.
    pub fn find_by_path(&self, tag_path: &str) -> Option<&TagNode> {
        let mut level = sorted_by_index(&self.roots);
        let mut found = None;
        for segment in path::segments(tag_path) {
            let node = level.into_iter().find(|node| node.name == segment)?;
            level = node.sorted_children();
            found = Some(node);
        }
        found
    }

    /// The tag path of `id`.
    pub fn path_of(&self, id: Uuid) -> Option<String> {
        let index = self.index();
        index.get(id)?;
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(tag_id) = current {
            names.push(self.find(tag_id)?.name.as_str());
            current = index.parent(tag_id);
        }
        names.reverse();
        Some(path::join(&names))
    }

    /// Pre-order walk with siblings in index order.
    pub fn flatten(&self) -> Vec<FlatTag<'_>> {
        fn visit<'a>(node: &'a TagNode, depth: usize, prefix: &str, out: &mut Vec<FlatTag<'a>>) {
            let path = if depth == 0 {
                node.name.clone()
            } else {
                format!("{prefix}{DELIMITER}{}", node.name)
            };
            out.push(FlatTag {
                depth,
                path: path.clone(),
                node,
            });
            for child in node.sorted_children() {
                visit(child, depth + 1, &path, out);
            }
        }

        let mut out = Vec::new();
        for root in sorted_by_index(&self.roots) {
            visit(root, 0, "", &mut out);
        }
        out
    }

    /// Every tag path, in pre-order.
    pub fn paths(&self) -> Vec<String> {
        self.flatten().into_iter().map(|flat| flat.path).collect()
    }

    /// Appends a new tag at the end of `parent`'s children (or the roots).
    pub fn add(
        &mut self,
        name: &str,
        color: Color,
        parent: Option<Uuid>,
    ) -> Result<Uuid, TagError> {
        let name = validate_name(name)?;
        let siblings = self.siblings_mut(parent)?;
        let mut node = TagNode::new(name, color);
        node.index = next_index(siblings);
        let id = node.id;
        siblings.push(node);
        tracing::debug!(%id, ?parent, "added tag");
        Ok(id)
    }

    /// Renames and recolors a tag.
    pub fn update(&mut self, id: Uuid, name: &str, color: Color) -> Result<(), TagError> {
        let name = validate_name(name)?;
        let node = find_in_mut(&mut self.roots, id).ok_or(TagError::NotFound(id))?;
        node.name = name;
        node.color = color;
        Ok(())
    }

    pub fn set_color(&mut self, id: Uuid, color: Color) -> Result<(), TagError> {
        let node = find_in_mut(&mut self.roots, id).ok_or(TagError::NotFound(id))?;
        node.color = color;
        Ok(())
    }

    /// Whether `id` may be re-parented under `new_parent`.
    ///
    /// Moving to the root level or under any ancestor is allowed; moving under
    /// the tag itself or one of its descendants is not.
    pub fn can_move(&self, id: Uuid, new_parent: Option<Uuid>) -> bool {
        let index = self.index();
        if !index.contains(id) {
            return false;
        }
        match new_parent {
            None => true,
            Some(target) => {
                target != id && index.contains(target) && !index.is_ancestor(id, target)
            }
        }
    }

    /// Re-parents a tag, appending it after the target's existing children.
    pub fn move_tag(&mut self, id: Uuid, new_parent: Option<Uuid>) -> Result<(), TagError> {
        if self.find(id).is_none() {
            return Err(TagError::NotFound(id));
        }
        if let Some(target) = new_parent {
            if self.find(target).is_none() {
                return Err(TagError::NotFound(target));
            }
            if !self.can_move(id, new_parent) {
                return Err(TagError::InvalidMove { id, target });
            }
        }

        let mut node = self.detach(id)?;
        let siblings = self.siblings_mut(new_parent)?;
        node.index = next_index(siblings);
        siblings.push(node);
        tracing::debug!(%id, ?new_parent, "moved tag");
        Ok(())
    }

    /// Moves a tag to `new_index` within its sibling list.
    ///
    /// Indices past the end place the tag last.
    pub fn reorder(&mut self, id: Uuid, new_index: usize) -> Result<(), TagError> {
        let entry = self.index().get(id).ok_or(TagError::NotFound(id))?;
        let siblings = self.siblings_mut(entry.parent)?;
        siblings.sort_by_key(|node| node.index);
        let from = siblings
            .iter()
            .position(|node| node.id == id)
            .ok_or(TagError::NotFound(id))?;
        let node = siblings.remove(from);
        let to = new_index.min(siblings.len());
        siblings.insert(to, node);
        reindex(siblings);
        Ok(())
    }

    /// Removes a tag together with its descendants.
    pub fn delete(&mut self, id: Uuid) -> Result<TagNode, TagError> {
        let removed = self.detach(id)?;
        tracing::debug!(%id, removed = removed.subtree_len(), "deleted tag");
        Ok(removed)
    }

    /// Renumbers every sibling list densely in its current order.
    pub fn renumber(&mut self) {
        fn visit(nodes: &mut [TagNode]) {
            reindex(nodes);
            for node in nodes {
                visit(&mut node.children);
            }
        }
        visit(&mut self.roots);
    }

    /// Sorts every sibling list by index and renumbers it densely.
    pub fn normalize(&mut self) {
        fn visit(nodes: &mut [TagNode]) {
            nodes.sort_by_key(|node| node.index);
            reindex(nodes);
            for node in nodes {
                visit(&mut node.children);
            }
        }
        visit(&mut self.roots);
    }

    fn detach(&mut self, id: Uuid) -> Result<TagNode, TagError> {
        let entry = self.index().get(id).ok_or(TagError::NotFound(id))?;
        let siblings = self.siblings_mut(entry.parent)?;
        siblings.sort_by_key(|node| node.index);
        let position = siblings
            .iter()
            .position(|node| node.id == id)
            .ok_or(TagError::NotFound(id))?;
        let node = siblings.remove(position);
        reindex(siblings);
        Ok(node)
    }

    fn siblings_mut(&mut self, parent: Option<Uuid>) -> Result<&mut Vec<TagNode>, TagError> {
        match parent {
            None => Ok(&mut self.roots),
            Some(parent_id) => find_in_mut(&mut self.roots, parent_id)
                .map(|node| &mut node.children)
                .ok_or(TagError::NotFound(parent_id)),
        }
    }
}

impl From<Vec<TagNode>> for TagTree {
    fn from(roots: Vec<TagNode>) -> Self {
        Self::new(roots)
    }
}

fn find_in(nodes: &[TagNode], id: Uuid) -> Option<&TagNode> {
    nodes
        .iter()
        .find_map(|node| if node.id == id { Some(node) } else { find_in(&node.children, id) })
}

fn find_in_mut(nodes: &mut [TagNode], id: Uuid) -> Option<&mut TagNode> {
    for node in nodes {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_in_mut(&mut node.children, id) {
            return Some(found);
        }
    }
    None
}

#[allow(clippy::cast_possible_truncation)]
fn next_index(siblings: &[TagNode]) -> u32 {
    siblings.len() as u32
}

#[allow(clippy::cast_possible_truncation)]
fn reindex(siblings: &mut [TagNode]) {
    for (idx, node) in siblings.iter_mut().enumerate() {
        node.index = idx as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Work { Meetings { Standup }, Email }, Personal
    fn sample_tree() -> (TagTree, [Uuid; 5]) {
        let mut tree = TagTree::default();
        let work = tree.add("Work", Color::Blue, None).unwrap();
        let meetings = tree.add("Meetings", Color::Green, Some(work)).unwrap();
        let standup = tree.add("Standup", Color::Teal, Some(meetings)).unwrap();
        let email = tree.add("Email", Color::Red, Some(work)).unwrap();
        let personal = tree.add("Personal", Color::Pink, None).unwrap();
        (tree, [work, meetings, standup, email, personal])
    }

    fn child_names(node: &TagNode) -> Vec<&str> {
        node.sorted_children()
            .into_iter()
            .map(|child| child.name.as_str())
            .collect()
    }

    #[test]
    fn add_appends_with_dense_indices() {
        let (tree, [work, meetings, _, email, personal]) = sample_tree();
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.find(work).unwrap().index, 0);
        assert_eq!(tree.find(personal).unwrap().index, 1);
        assert_eq!(tree.find(meetings).unwrap().index, 0);
        assert_eq!(tree.find(email).unwrap().index, 1);
    }

    #[test]
    fn add_rejects_unknown_parent_and_bad_names() {
        let (mut tree, _) = sample_tree();
        let missing = Uuid::new_v4();
        assert_eq!(
            tree.add("X", Color::Blue, Some(missing)),
            Err(TagError::NotFound(missing))
        );
        assert!(matches!(
            tree.add("   ", Color::Blue, None),
            Err(TagError::InvalidName { .. })
        ));
        assert!(matches!(
            tree.add("Work > Sub", Color::Blue, None),
            Err(TagError::InvalidName { .. })
        ));
    }

    #[test]
    fn paths_follow_index_order() {
        let (tree, [_, _, standup, ..]) = sample_tree();
        assert_eq!(
            tree.paths(),
            vec![
                "Work",
                "Work > Meetings",
                "Work > Meetings > Standup",
                "Work > Email",
                "Personal",
            ]
        );
        assert_eq!(
            tree.path_of(standup).as_deref(),
            Some("Work > Meetings > Standup")
        );
        assert_eq!(tree.path_of(Uuid::new_v4()), None);
    }

    #[test]
    fn find_by_path_walks_names() {
        let (tree, [_, _, standup, ..]) = sample_tree();
        assert_eq!(
            tree.find_by_path("Work > Meetings > Standup").map(|n| n.id),
            Some(standup)
        );
        assert!(tree.find_by_path("Work > Standup").is_none());
    }

    #[test]
    fn update_and_set_color() {
        let (mut tree, [work, ..]) = sample_tree();
        tree.update(work, " Job ", Color::Mauve).unwrap();
        let node = tree.find(work).unwrap();
        assert_eq!(node.name, "Job");
        assert_eq!(node.color, Color::Mauve);

        tree.set_color(work, Color::Yellow).unwrap();
        assert_eq!(tree.find(work).unwrap().color, Color::Yellow);
    }

    #[test]
    fn index_tracks_parents_and_depth() {
        let (tree, [work, meetings, standup, _, personal]) = sample_tree();
        let index = tree.index();
        assert_eq!(index.len(), 5);
        assert_eq!(
            index.get(standup),
            Some(IndexEntry {
                parent: Some(meetings),
                depth: 2
            })
        );
        assert_eq!(index.parent(personal), None);
        assert_eq!(index.ancestors(standup), vec![meetings, work]);
        assert!(index.is_ancestor(work, standup));
        assert!(!index.is_ancestor(standup, work));
    }

    #[test]
    fn can_move_rejects_self_and_descendants() {
        let (tree, [work, meetings, standup, email, personal]) = sample_tree();
        assert!(!tree.can_move(work, Some(work)));
        assert!(!tree.can_move(work, Some(standup)));
        assert!(!tree.can_move(meetings, Some(standup)));
        assert!(tree.can_move(standup, Some(work)));
        assert!(tree.can_move(email, Some(personal)));
        assert!(tree.can_move(standup, None));
        assert!(!tree.can_move(Uuid::new_v4(), None));
    }

    #[test]
    fn move_appends_and_reindexes_both_sides() {
        let (mut tree, [work, meetings, _, email, personal]) = sample_tree();
        tree.move_tag(meetings, Some(personal)).unwrap();

        assert_eq!(child_names(tree.find(work).unwrap()), vec!["Email"]);
        assert_eq!(tree.find(email).unwrap().index, 0);
        assert_eq!(child_names(tree.find(personal).unwrap()), vec!["Meetings"]);
        assert_eq!(
            tree.path_of(meetings).as_deref(),
            Some("Personal > Meetings")
        );
    }

    #[test]
    fn move_to_root_and_invalid_move() {
        let (mut tree, [work, meetings, standup, ..]) = sample_tree();
        let before = tree.clone();
        assert_eq!(
            tree.move_tag(work, Some(standup)),
            Err(TagError::InvalidMove {
                id: work,
                target: standup
            })
        );
        assert_eq!(tree, before);

        tree.move_tag(meetings, None).unwrap();
        let roots: Vec<_> = tree.roots().iter().map(|r| (r.name.as_str(), r.index)).collect();
        assert_eq!(roots, vec![("Work", 0), ("Personal", 1), ("Meetings", 2)]);
    }

    #[test]
    fn reorder_clamps_and_renumbers() {
        let (mut tree, [work, meetings, _, email, _]) = sample_tree();
        tree.reorder(email, 0).unwrap();
        assert_eq!(child_names(tree.find(work).unwrap()), vec!["Email", "Meetings"]);
        assert_eq!(tree.find(meetings).unwrap().index, 1);

        tree.reorder(email, 99).unwrap();
        assert_eq!(child_names(tree.find(work).unwrap()), vec!["Meetings", "Email"]);
        assert_eq!(tree.find(email).unwrap().index, 1);
    }

    #[test]
    fn delete_removes_descendants() {
        let (mut tree, [work, meetings, standup, email, _]) = sample_tree();
        let removed = tree.delete(meetings).unwrap();
        assert_eq!(removed.subtree_len(), 2);
        assert!(tree.find(standup).is_none());
        assert_eq!(tree.find(email).unwrap().index, 0);
        assert_eq!(tree.len(), 3);
        assert_eq!(child_names(tree.find(work).unwrap()), vec!["Email"]);
        assert_eq!(tree.delete(meetings), Err(TagError::NotFound(meetings)));
    }

    #[test]
    fn names_touching_the_delimiter_are_rejected() {
        for name in ["Work >", "> Work", " > x ", "a > b"] {
            assert!(
                matches!(validate_name(name), Err(TagError::InvalidName { .. })),
                "{name:?} should be rejected"
            );
        }
        for name in ["a>b", "->", "x -> y", ">"] {
            assert!(validate_name(name).is_ok(), "{name:?} should be accepted");
        }

        let mut tree = TagTree::default();
        assert!(tree.add("Work >", Color::Blue, None).is_err());
        let work = tree.add("Work", Color::Blue, None).unwrap();
        let child = tree.add("x -> y", Color::Red, Some(work)).unwrap();
        let tag_path = tree.path_of(child).unwrap();
        assert_eq!(path::segments(&tag_path), vec!["Work", "x -> y"]);
        assert_eq!(tree.find_by_path(&tag_path).map(|node| node.id), Some(child));
    }

    #[test]
    fn renumber_keeps_list_order() {
        let mut a = TagNode::new("A", Color::Blue);
        a.index = 4;
        let mut b = TagNode::new("B", Color::Blue);
        b.index = 0;
        b.children = vec![TagNode::new("C", Color::Blue), TagNode::new("D", Color::Blue)];
        let mut tree = TagTree::new(vec![a, b]);
        tree.renumber();
        let roots: Vec<_> = tree.roots().iter().map(|r| (r.name.as_str(), r.index)).collect();
        assert_eq!(roots, vec![("A", 0), ("B", 1)]);
        let children: Vec<u32> = tree.roots()[1].children.iter().map(|c| c.index).collect();
        assert_eq!(children, vec![0, 1]);
    }

    #[test]
    fn normalize_sorts_and_densifies() {
        let mut a = TagNode::new("A", Color::Blue);
        a.index = 7;
        let mut b = TagNode::new("B", Color::Blue);
        b.index = 3;
        let mut tree = TagTree::new(vec![a, b]);
        tree.normalize();
        let roots: Vec<_> = tree.roots().iter().map(|r| (r.name.as_str(), r.index)).collect();
        assert_eq!(roots, vec![("B", 0), ("A", 1)]);
    }
}
