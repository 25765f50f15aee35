//! Command implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{info, warn};

use crate::adapters::{EncoderSettings, FfmpegAdapter, FfprobeAdapter, TomlConfigAdapter};
use crate::cli::args::{InspectArgs, ServeArgs};
use crate::config::Settings;
use crate::domain::rules;
use crate::engine::{EngineConfig, TrimEngine};
use crate::http::{router, AppState};
use crate::planner::KeyframeIndex;
use crate::ports::ProbePort;
use crate::store::AssetStore;
use crate::utils::logging::init_logging;
use crate::workspace::WorkspaceRegistry;

/// Settings plus where they came from, reported once logging is up
#[derive(Debug)]
pub struct LoadedSettings {
    pub settings: Settings,
    pub file: Option<PathBuf>,
    pub env_overrides: Vec<&'static str>,
}

impl LoadedSettings {
    pub fn log_sources(&self) {
        match &self.file {
            Some(path) => info!("Configuration loaded from: {}", path.display()),
            None => info!("No configuration file found, using defaults"),
        }
        if !self.env_overrides.is_empty() {
            info!(
                "Applied {} environment overrides: {}",
                self.env_overrides.len(),
                self.env_overrides.join(", ")
            );
        }
    }
}

/// Layer settings: file, then `CLIPIA_*` environment, then command-line flags
pub fn load_settings(
    config: Option<&Path>,
    log_level: Option<&str>,
    args: &ServeArgs,
) -> Result<LoadedSettings> {
    let file = TomlConfigAdapter::locate(config);
    let mut settings =
        TomlConfigAdapter::load_file(file.as_deref()).context("Failed to load settings file")?;
    let env_overrides = TomlConfigAdapter::apply_env(&mut settings)
        .context("Invalid CLIPIA_* environment value")?;

    if let Some(level) = log_level {
        settings.logging.level = level.to_string();
    }
    if let Some(bind) = &args.bind {
        settings.server.bind = bind.clone();
    }
    if let Some(root) = &args.storage_root {
        settings.storage.root = root.clone();
    }
    if let Some(policy) = args.policy {
        settings.trim.default_policy = policy;
    }
    if let Some(max) = args.max_concurrent {
        settings.trim.max_concurrent = max;
    }

    settings.validate().context("Invalid settings")?;
    Ok(LoadedSettings {
        settings,
        file,
        env_overrides,
    })
}

/// Execute the serve command
pub async fn serve(config: Option<&Path>, log_level: Option<&str>, args: ServeArgs) -> Result<()> {
    let loaded = load_settings(config, log_level, &args)?;
    init_logging(&loaded.settings.logging.level, loaded.settings.logging.format)?;
    loaded.log_sources();
    let settings = loaded.settings;

    info!("Starting Clipia");
    info!("Storage root: {}", settings.storage.root.display());
    info!(
        "Default policy: {}, timeout: {}s, concurrency: {}",
        settings.trim.default_policy, settings.trim.timeout_secs, settings.trim.max_concurrent
    );

    let store = AssetStore::open(
        &settings.storage.root,
        settings.storage.max_upload_bytes,
        settings.storage.accepted_media(),
    )
    .await
    .context("Failed to open asset store")?;

    match store
        .sweep_stale(Duration::from_secs(settings.storage.stale_staging_secs))
        .await
    {
        Ok(0) => {}
        Ok(removed) => info!("Removed {} abandoned staging files", removed),
        Err(e) => warn!("Staging sweep failed: {}", e),
    }

    let probe = Arc::new(FfprobeAdapter::new(settings.trim.ffprobe_path.clone()));
    let exec = Arc::new(FfmpegAdapter::new(
        settings.trim.ffmpeg_path.clone(),
        EncoderSettings::from(&settings.trim),
    ));
    let engine = TrimEngine::new(store.clone(), probe, exec, EngineConfig::from(&settings))
        .await
        .context("Failed to prepare trim scratch directory")?;

    let workspace = match &settings.workspace.snapshot_path {
        Some(path) => {
            WorkspaceRegistry::with_snapshot(settings.workspace.default_context.clone(), path)
                .await
                .context("Failed to load workspace snapshot")?
        }
        None => WorkspaceRegistry::new(settings.workspace.default_context.clone()),
    }
    .with_max_sessions(settings.workspace.max_sessions);

    let app = router(AppState::new(store, engine, workspace));
    let listener = tokio::net::TcpListener::bind(&settings.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", settings.server.bind))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Clipia stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

/// Execute the inspect command
pub async fn inspect(config: Option<&Path>, log_level: Option<&str>, args: InspectArgs) -> Result<()> {
    let loaded = load_settings(config, log_level, &ServeArgs::default())?;
    init_logging(&loaded.settings.logging.level, loaded.settings.logging.format)?;
    loaded.log_sources();
    let settings = loaded.settings;

    if !args.input.exists() {
        return Err(anyhow::anyhow!(
            "Input file does not exist: {}",
            args.input.display()
        ));
    }

    let probe = FfprobeAdapter::new(settings.trim.ffprobe_path.clone());
    let info = probe
        .probe_media(&args.input)
        .await
        .context("Failed to inspect input file")?;

    let keyframes = match (&info.video, args.no_keyframes) {
        (Some(video), false) => KeyframeIndex::new(
            probe
                .probe_keyframes(&args.input, video.index)
                .await
                .context("Failed to scan keyframes")?,
        ),
        _ => KeyframeIndex::default(),
    };

    let report = json!({
        "media": info,
        "stream_copy_supported": rules::copy_supported(&info),
        "hybrid_compatible": rules::hybrid_compatible(&info),
        "keyframes": {
            "count": keyframes.len(),
            "average_interval": keyframes.average_interval(),
            "max_interval": keyframes.max_interval(info.duration),
        },
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::TrimPolicy;

    #[test]
    fn test_load_settings_reports_file_and_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clipia.toml");
        std::fs::write(&path, "[server]\nbind = \"127.0.0.1:9999\"\n").unwrap();

        let args = ServeArgs {
            policy: Some(TrimPolicy::Exact),
            ..ServeArgs::default()
        };
        let loaded = load_settings(Some(&path), Some("debug"), &args).unwrap();

        assert_eq!(loaded.file.as_deref(), Some(path.as_path()));
        assert_eq!(loaded.settings.server.bind, "127.0.0.1:9999");
        assert_eq!(loaded.settings.logging.level, "debug");
        assert_eq!(loaded.settings.trim.default_policy, TrimPolicy::Exact);
    }

    #[test]
    fn test_load_settings_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(load_settings(Some(&missing), None, &ServeArgs::default()).is_err());
    }
}
