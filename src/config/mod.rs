//! Service settings and their defaults
//!
//! Values are layered CLI > environment > TOML file > defaults; see
//! [`crate::adapters::toml_config`] for the loading side.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::model::TrimPolicy;
use crate::domain::rules::{AcceptedMedia, MIN_SPLIT_STEP};
use crate::error::{ClipiaError, ClipiaResult};
use crate::utils::logging::LogFormat;

/// Default context text attached to a fresh workspace
pub const DEFAULT_CONTEXT: &str = "Live gameplay stream footage";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub trim: TrimSettings,
    pub workspace: WorkspaceSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Socket address to listen on
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Root of the asset store
    pub root: PathBuf,
    /// Scratch space for trims; `<root>/.scratch` when unset
    pub temp_dir: Option<PathBuf>,
    pub max_upload_bytes: u64,
    pub video_extensions: Vec<String>,
    pub image_extensions: Vec<String>,
    /// Age after which abandoned staging files are swept at startup
    pub stale_staging_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        let accepted = AcceptedMedia::default();
        Self {
            root: PathBuf::from("data"),
            temp_dir: None,
            max_upload_bytes: 256 * 1024 * 1024,
            video_extensions: accepted.video_extensions,
            image_extensions: accepted.image_extensions,
            stale_staging_secs: 3600,
        }
    }
}

impl StorageSettings {
    pub fn scratch_dir(&self) -> PathBuf {
        self.temp_dir
            .clone()
            .unwrap_or_else(|| self.root.join(".scratch"))
    }

    pub fn accepted_media(&self) -> AcceptedMedia {
        AcceptedMedia {
            video_extensions: self.video_extensions.clone(),
            image_extensions: self.image_extensions.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimSettings {
    pub default_policy: TrimPolicy,
    /// Wall-clock budget for a single trim
    pub timeout_secs: u64,
    /// Trims allowed to run at once
    pub max_concurrent: usize,
    /// Shortest middle section worth stream copying in smart mode
    pub min_copy_seconds: f64,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub video_encoder: String,
    pub audio_encoder: String,
    pub preset: String,
    pub crf: u8,
    pub split_clip_seconds: f64,
    pub split_overlap_seconds: f64,
}

impl Default for TrimSettings {
    fn default() -> Self {
        Self {
            default_policy: TrimPolicy::Smart,
            timeout_secs: 600,
            max_concurrent: num_cpus::get().clamp(1, 4),
            min_copy_seconds: 2.0,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            video_encoder: "libx264".to_string(),
            audio_encoder: "aac".to_string(),
            preset: "veryfast".to_string(),
            crf: 18,
            split_clip_seconds: 1500.0,
            split_overlap_seconds: 180.0,
        }
    }
}

impl TrimSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSettings {
    /// JSON snapshot of every session, rewritten after each change
    pub snapshot_path: Option<PathBuf>,
    pub default_context: String,
    /// Sessions tracked at once; the least recently updated is evicted beyond this
    pub max_sessions: usize,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            default_context: DEFAULT_CONTEXT.to_string(),
            max_sessions: crate::workspace::DEFAULT_MAX_SESSIONS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Settings {
    /// Reject settings the service cannot start with
    pub fn validate(&self) -> ClipiaResult<()> {
        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            return Err(ClipiaError::validation(format!(
                "server.bind '{}' is not a socket address",
                self.server.bind
            )));
        }
        if self.storage.max_upload_bytes == 0 {
            return Err(ClipiaError::validation(
                "storage.max_upload_bytes must be greater than zero",
            ));
        }
        if self.storage.video_extensions.is_empty() {
            return Err(ClipiaError::validation(
                "storage.video_extensions cannot be empty",
            ));
        }
        for ext in self
            .storage
            .video_extensions
            .iter()
            .chain(&self.storage.image_extensions)
        {
            if AcceptedMedia::content_type_for(ext).is_none() {
                return Err(ClipiaError::validation(format!(
                    "storage: unknown media extension '{}'",
                    ext
                )));
            }
        }
        if self.trim.timeout_secs == 0 {
            return Err(ClipiaError::validation("trim.timeout_secs must be positive"));
        }
        if self.trim.max_concurrent == 0 {
            return Err(ClipiaError::validation(
                "trim.max_concurrent must be at least 1",
            ));
        }
        if self.trim.crf > 51 {
            return Err(ClipiaError::validation("trim.crf must be between 0 and 51"));
        }
        if !(self.trim.min_copy_seconds >= 0.0) {
            return Err(ClipiaError::validation(
                "trim.min_copy_seconds cannot be negative",
            ));
        }
        if self.trim.split_clip_seconds - self.trim.split_overlap_seconds < MIN_SPLIT_STEP {
            return Err(ClipiaError::validation(format!(
                "trim.split_clip_seconds must exceed trim.split_overlap_seconds by at least {}s",
                MIN_SPLIT_STEP
            )));
        }
        if self.workspace.max_sessions == 0 {
            return Err(ClipiaError::validation(
                "workspace.max_sessions must be at least 1",
            ));
        }
        Ok(())
    }
}
