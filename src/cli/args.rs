//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;

use crate::domain::model::TrimPolicy;

/// Arguments for the serve command
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Socket address to listen on
    #[arg(long)]
    pub bind: Option<String>,

    /// Root directory of the asset store
    #[arg(long)]
    pub storage_root: Option<PathBuf>,

    /// Trim policy used when a request names none (exact, fast, smart)
    #[arg(long)]
    pub policy: Option<TrimPolicy>,

    /// Maximum concurrent trims
    #[arg(long)]
    pub max_concurrent: Option<usize>,
}

/// Arguments for the inspect command
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Input video file path
    #[arg(short, long)]
    pub input: PathBuf,

    /// Skip the keyframe scan
    #[arg(long)]
    pub no_keyframes: bool,
}
