//! Pressmark - sync markdown blog posts with a WordPress site.

mod cli;
mod config;
mod convert;
mod images;
mod logger;
mod post;
mod remote;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = Config::load(&cli.config)?;

    match &cli.command {
        Commands::Upload { path, verbose } => {
            logger::set_verbose(*verbose);
            cli::upload::upload_post(path, &config)
        }
        Commands::Download {
            guid,
            all,
            dir,
            verbose,
        } => {
            logger::set_verbose(*verbose);
            cli::download::download_posts(guid.as_deref(), *all, dir, &config)
        }
    }
}
