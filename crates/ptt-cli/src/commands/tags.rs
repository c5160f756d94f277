//! Tag hierarchy commands.
//!
//! Every edit loads the tree, applies the change in memory, and writes the
//! whole tree back.

use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use ptt_core::{Color, TagNode, TagTree, outline};
use ptt_db::Database;
use serde::Serialize;
use uuid::Uuid;

use super::open_database;
use super::util::resolve_tag;
use crate::{Config, TagsAction};

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Outline file to read; stdin when omitted.
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// File to write; stdout when omitted.
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
    /// Include the children of collapsed tags.
    #[arg(long)]
    pub all: bool,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Name of the new tag.
    pub name: String,
    /// Palette color name or hex value.
    #[arg(long, default_value_t = Color::default())]
    pub color: Color,
    /// Parent tag, as an id or a full path such as "Work > Meetings".
    #[arg(long)]
    pub parent: Option<String>,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    /// Tag id or full path.
    pub tag: String,
    /// New name.
    #[arg(long)]
    pub name: Option<String>,
    /// New color.
    #[arg(long)]
    pub color: Option<Color>,
}

#[derive(Debug, Args)]
pub struct MoveArgs {
    /// Tag id or full path.
    pub tag: String,
    /// New parent; the tag becomes top-level when omitted.
    #[arg(long)]
    pub parent: Option<String>,
}

#[derive(Debug, Args)]
pub struct ReorderArgs {
    /// Tag id or full path.
    pub tag: String,
    /// Zero-based position among its siblings. Positions past the end place it last.
    pub index: usize,
}

#[derive(Debug, Args)]
pub struct TagRefArgs {
    /// Tag id or full path.
    pub tag: String,
}

pub fn run<R: Read, W: Write>(
    input: &mut R,
    writer: &mut W,
    action: &TagsAction,
    config: &Config,
) -> Result<()> {
    let mut db = open_database(config)?;
    match action {
        TagsAction::Import(args) => import(&mut db, input, writer, args),
        TagsAction::Export(args) => export(&db, writer, args),
        TagsAction::List(args) => list(&db, writer, args),
        TagsAction::Add(args) => add(&mut db, writer, args),
        TagsAction::Edit(args) => edit(&mut db, writer, args),
        TagsAction::Move(args) => move_tag(&mut db, writer, args),
        TagsAction::Reorder(args) => reorder(&mut db, writer, args),
        TagsAction::Delete(args) => delete(&mut db, writer, args),
        TagsAction::Collapse(args) => set_collapsed(&db, writer, args, true),
        TagsAction::Expand(args) => set_collapsed(&db, writer, args, false),
    }
}

fn import<R: Read, W: Write>(
    db: &mut Database,
    input: &mut R,
    writer: &mut W,
    args: &ImportArgs,
) -> Result<()> {
    let text = match &args.file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut text = String::new();
            input
                .read_to_string(&mut text)
                .context("failed to read outline from stdin")?;
            text
        }
    };

    let mut tree = TagTree::new(outline::parse(&text));
    tree.renumber();
    let count = db.replace_tags(&tree)?;
    tracing::info!(tags = count, roots = tree.roots().len(), "imported tags");
    writeln!(
        writer,
        "Imported {count} tags ({} top-level)",
        tree.roots().len()
    )?;
    Ok(())
}

fn export<W: Write>(db: &Database, writer: &mut W, args: &ExportArgs) -> Result<()> {
    let tree = db.load_tags()?;
    let text = outline::export(tree.roots());
    match &args.file {
        Some(path) => {
            std::fs::write(path, &text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            writeln!(writer, "Exported {} tags to {}", tree.len(), path.display())?;
        }
        None => write!(writer, "{text}")?,
    }
    Ok(())
}

fn list<W: Write>(db: &Database, writer: &mut W, args: &ListArgs) -> Result<()> {
    let tree = db.load_tags()?;
    let collapsed = db.collapsed_tags()?;
    if args.json {
        let json: Vec<JsonTag<'_>> = tree
            .roots()
            .iter()
            .map(|root| JsonTag::build(root, "", &collapsed))
            .collect();
        writeln!(writer, "{}", serde_json::to_string_pretty(&json)?)?;
    } else {
        write_tree(writer, &tree, &collapsed, args.all)?;
    }
    Ok(())
}

/// Renders the tree one tag per line, hiding collapsed subtrees unless `show_all`.
pub fn write_tree<W: Write>(
    writer: &mut W,
    tree: &TagTree,
    collapsed: &HashSet<Uuid>,
    show_all: bool,
) -> Result<()> {
    if tree.is_empty() {
        writeln!(writer, "No tags yet.")?;
        writeln!(writer)?;
        writeln!(writer, "Hint: Run 'ptt tags import' or 'ptt tags add <name>'.")?;
        return Ok(());
    }

    let mut hidden_below: Option<usize> = None;
    for flat in tree.flatten() {
        if hidden_below.is_some_and(|depth| flat.depth > depth) {
            continue;
        }
        hidden_below = None;

        let is_collapsed = collapsed.contains(&flat.node.id);
        let marker = match (flat.node.children.is_empty(), is_collapsed) {
            (true, _) => "•",
            (false, true) => "▸",
            (false, false) => "▾",
        };
        writeln!(
            writer,
            "{}{marker} {} ({})",
            "  ".repeat(flat.depth),
            flat.node.name,
            flat.node.color
        )?;

        if is_collapsed && !show_all && !flat.node.children.is_empty() {
            hidden_below = Some(flat.depth);
        }
    }
    Ok(())
}

/// A tag in `tags list --json` output.
#[derive(Debug, Serialize)]
struct JsonTag<'a> {
    id: Uuid,
    name: &'a str,
    path: String,
    color: Color,
    hex: &'static str,
    collapsed: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<JsonTag<'a>>,
}

impl<'a> JsonTag<'a> {
    fn build(node: &'a TagNode, parent_path: &str, collapsed: &HashSet<Uuid>) -> Self {
        let path = if parent_path.is_empty() {
            node.name.clone()
        } else {
            format!("{parent_path}{}{}", ptt_core::path::DELIMITER, node.name)
        };
        let children = node
            .sorted_children()
            .into_iter()
            .map(|child| Self::build(child, &path, collapsed))
            .collect();
        Self {
            id: node.id,
            name: &node.name,
            path,
            color: node.color,
            hex: node.color.hex(),
            collapsed: collapsed.contains(&node.id),
            children,
        }
    }
}

fn add<W: Write>(db: &mut Database, writer: &mut W, args: &AddArgs) -> Result<()> {
    let mut tree = db.load_tags()?;
    let parent = args
        .parent
        .as_deref()
        .map(|reference| resolve_tag(&tree, reference))
        .transpose()?;
    let id = tree.add(&args.name, args.color, parent)?;
    db.replace_tags(&tree)?;
    writeln!(writer, "Added tag {} ({id})", path_or_id(&tree, id))?;
    Ok(())
}

fn edit<W: Write>(db: &mut Database, writer: &mut W, args: &EditArgs) -> Result<()> {
    if args.name.is_none() && args.color.is_none() {
        bail!("nothing to change: pass --name and/or --color");
    }
    let mut tree = db.load_tags()?;
    let id = resolve_tag(&tree, &args.tag)?;
    let (name, color) = {
        let node = tree.find(id).with_context(|| format!("tag not found: {id}"))?;
        (
            args.name.clone().unwrap_or_else(|| node.name.clone()),
            args.color.unwrap_or(node.color),
        )
    };
    tree.update(id, &name, color)?;
    db.replace_tags(&tree)?;
    writeln!(writer, "Updated tag {} ({color})", path_or_id(&tree, id))?;
    Ok(())
}

fn move_tag<W: Write>(db: &mut Database, writer: &mut W, args: &MoveArgs) -> Result<()> {
    let mut tree = db.load_tags()?;
    let id = resolve_tag(&tree, &args.tag)?;
    let parent = args
        .parent
        .as_deref()
        .map(|reference| resolve_tag(&tree, reference))
        .transpose()?;
    if !tree.can_move(id, parent) {
        bail!(
            "cannot move {} under itself or one of its descendants",
            path_or_id(&tree, id)
        );
    }
    tree.move_tag(id, parent)?;
    db.replace_tags(&tree)?;
    writeln!(writer, "Moved tag to {}", path_or_id(&tree, id))?;
    Ok(())
}

fn reorder<W: Write>(db: &mut Database, writer: &mut W, args: &ReorderArgs) -> Result<()> {
    let mut tree = db.load_tags()?;
    let id = resolve_tag(&tree, &args.tag)?;
    tree.reorder(id, args.index)?;
    db.replace_tags(&tree)?;
    let position = tree.find(id).map_or(0, |node| node.index);
    writeln!(
        writer,
        "Moved {} to position {position}",
        path_or_id(&tree, id)
    )?;
    Ok(())
}

fn delete<W: Write>(db: &mut Database, writer: &mut W, args: &TagRefArgs) -> Result<()> {
    let mut tree = db.load_tags()?;
    let id = resolve_tag(&tree, &args.tag)?;
    let path = path_or_id(&tree, id);
    let removed = tree.delete(id)?;
    db.replace_tags(&tree)?;

    let mut removed_ids = Vec::new();
    collect_ids(&removed, &mut removed_ids);
    for removed_id in &removed_ids {
        db.set_collapsed(*removed_id, false)?;
    }

    match removed_ids.len() - 1 {
        0 => writeln!(writer, "Deleted tag {path}")?,
        1 => writeln!(writer, "Deleted tag {path} and 1 descendant")?,
        n => writeln!(writer, "Deleted tag {path} and {n} descendants")?,
    }
    Ok(())
}

fn set_collapsed<W: Write>(
    db: &Database,
    writer: &mut W,
    args: &TagRefArgs,
    collapsed: bool,
) -> Result<()> {
    let tree = db.load_tags()?;
    let id = resolve_tag(&tree, &args.tag)?;
    db.set_collapsed(id, collapsed)?;
    let verb = if collapsed { "Collapsed" } else { "Expanded" };
    writeln!(writer, "{verb} {}", path_or_id(&tree, id))?;
    Ok(())
}

fn path_or_id(tree: &TagTree, id: Uuid) -> String {
    tree.path_of(id).unwrap_or_else(|| id.to_string())
}

fn collect_ids(node: &TagNode, out: &mut Vec<Uuid>) {
    out.push(node.id);
    for child in &node.children {
        collect_ids(child, out);
    }
}
