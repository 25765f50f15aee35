//! Clipia service binary
//!
//! ```bash
//! clipia serve --bind 0.0.0.0:8080 --storage-root ./data
//! clipia inspect --input video.mp4
//! ```

use anyhow::Result;
use clap::Parser;

use clipia::cli::{commands, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config.as_deref();
    let log_level = cli.log_level.as_deref();

    match cli.command {
        Commands::Serve(args) => commands::serve(config, log_level, args).await,
        Commands::Inspect(args) => commands::inspect(config, log_level, args).await,
    }
}
