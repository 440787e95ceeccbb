//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Pressmark blog synchronizer CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: pressmark.toml)
    #[arg(short = 'C', long, default_value = "pressmark.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Publish a markdown post, uploading its local images
    #[command(visible_alias = "u")]
    Upload {
        /// Markdown document to publish
        #[arg(value_hint = clap::ValueHint::FilePath)]
        path: PathBuf,

        /// Enable verbose output for debugging
        #[arg(short = 'V', long)]
        verbose: bool,
    },

    /// Fetch posts into the local dated layout
    #[command(visible_alias = "d")]
    Download {
        /// Guid of a single post to fetch
        #[arg(conflicts_with = "all")]
        guid: Option<String>,

        /// Fetch every post on the remote
        #[arg(short, long)]
        all: bool,

        /// Base directory for downloaded posts
        #[arg(short, long, default_value = "posts", value_hint = clap::ValueHint::DirPath)]
        dir: PathBuf,

        /// Enable verbose output for debugging
        #[arg(short = 'V', long)]
        verbose: bool,
    },
}

#[allow(unused)]
impl Cli {
    pub const fn is_upload(&self) -> bool {
        matches!(self.command, Commands::Upload { .. })
    }
    pub const fn is_download(&self) -> bool {
        matches!(self.command, Commands::Download { .. })
    }
}
