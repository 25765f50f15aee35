//! CLI module for Clipia
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod args;
pub mod commands;

pub use args::{InspectArgs, ServeArgs};

/// Clipia video trimming service
///
/// Stores uploaded videos and images and produces trimmed clips as new
/// derived assets over HTTP.
#[derive(Parser, Debug)]
#[command(name = "clipia")]
#[command(about = "Clipia - upload, trim and serve video clips")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Settings file (TOML). Defaults to ./clipia.toml or ./config/clipia.toml when present
    #[arg(long, global = true, env = "CLIPIA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level, overrides the settings file and CLIPIA_LOG_LEVEL
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP service
    Serve(ServeArgs),
    /// Probe a local media file and print what the trim planner sees
    Inspect(InspectArgs),
}
