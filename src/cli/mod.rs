//! Command-line interface module.

mod args;
pub mod download;
pub mod upload;

pub use args::{Cli, Commands};
