//! Personal time tracker CLI library.
//!
//! This crate provides the `ptt` command-line interface over the tag
//! hierarchy engine and its storage.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, LogAction, TagsAction};
pub use config::Config;
