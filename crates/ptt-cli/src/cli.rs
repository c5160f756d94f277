//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::log::{LogAddArgs, LogEditArgs, LogIdArgs, LogListArgs};
use crate::commands::report::ReportArgs;
use crate::commands::tags::{
    AddArgs, EditArgs, ExportArgs, ImportArgs, ListArgs, MoveArgs, ReorderArgs, TagRefArgs,
};

/// Personal time tracker.
///
/// Organizes tracked time under a hierarchy of tags and reports how long was
/// spent on each branch.
#[derive(Debug, Parser)]
#[command(name = "ptt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage the tag hierarchy.
    #[command(subcommand)]
    Tags(TagsAction),

    /// Record and browse logged sessions.
    #[command(subcommand)]
    Log(LogAction),

    /// Show time per tag, rolled up through the hierarchy.
    Report(ReportArgs),
}

/// Tag subcommands.
#[derive(Debug, Subcommand)]
pub enum TagsAction {
    /// Replace every tag with an outline read from a file or stdin.
    Import(ImportArgs),
    /// Write the tag tree as an outline.
    Export(ExportArgs),
    /// Show the tag tree.
    List(ListArgs),
    /// Create a tag.
    Add(AddArgs),
    /// Rename or recolor a tag.
    Edit(EditArgs),
    /// Move a tag under another parent, or to the top level.
    Move(MoveArgs),
    /// Change a tag's position among its siblings.
    Reorder(ReorderArgs),
    /// Delete a tag and everything below it.
    Delete(TagRefArgs),
    /// Hide a tag's children in `tags list`.
    Collapse(TagRefArgs),
    /// Show a tag's children in `tags list` again.
    Expand(TagRefArgs),
}

/// Session log subcommands.
#[derive(Debug, Subcommand)]
pub enum LogAction {
    /// Record a tagged session.
    Add(LogAddArgs),
    /// List logged sessions, newest first.
    List(LogListArgs),
    /// Change a logged session.
    Edit(LogEditArgs),
    /// Delete a logged session.
    Delete(LogIdArgs),
}
