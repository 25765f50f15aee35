//! Clipia video trimming service
//!
//! Uploaded videos and images go into a durable [`store::AssetStore`]. The
//! [`engine::TrimEngine`] cuts stored videos into new derived assets using a
//! stream-copy, re-encode or hybrid plan, and the [`http`] module exposes it all
//! over axum. Per-session "current asset" state lives in [`workspace`].

pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod http;
pub mod output;
pub mod planner;
pub mod ports;
pub mod store;
pub mod utils;
pub mod workspace;

// Re-export commonly used types
pub use config::Settings;
pub use domain::model::{Asset, AssetId, AssetKind, MediaInfo, TimeSpec, TrimPolicy, TrimRequest};
pub use engine::{EngineConfig, TrimEngine, TrimOutcome};
pub use error::{ClipiaError, ClipiaResult, ErrorKind};
pub use store::AssetStore;
pub use workspace::{SessionId, WorkspaceRegistry};
