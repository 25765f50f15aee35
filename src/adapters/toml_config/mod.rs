// TOML config adapter - Settings from a TOML file plus CLIPIA_* environment overrides

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::Settings;
use crate::error::{ClipiaError, ClipiaResult};

/// Files tried, in order, when no config path is given
const DEFAULT_CONFIG_PATHS: &[&str] = &["clipia.toml", "config/clipia.toml"];

/// TOML configuration adapter
pub struct TomlConfigAdapter;

impl TomlConfigAdapter {
    /// The config file to read: the explicit path, else the first default path that exists
    pub fn locate(path: Option<&Path>) -> Option<PathBuf> {
        match path {
            Some(path) => Some(path.to_path_buf()),
            None => DEFAULT_CONFIG_PATHS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.is_file()),
        }
    }

    /// Load file settings from [`Self::locate`], or defaults when there is no file
    pub fn load_file(path: Option<&Path>) -> ClipiaResult<Settings> {
        let Some(path) = Self::locate(path) else {
            debug!("No configuration file found, using defaults");
            return Ok(Settings::default());
        };

        debug!("Loading configuration from: {}", path.display());
        let content = std::fs::read_to_string(&path).map_err(|e| {
            ClipiaError::validation(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse settings from TOML text; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> ClipiaResult<Settings> {
        toml::from_str(content)
            .map_err(|e| ClipiaError::validation(format!("Failed to parse TOML config: {}", e)))
    }

    /// Apply `CLIPIA_*` overrides using the process environment
    pub fn apply_env(settings: &mut Settings) -> ClipiaResult<Vec<&'static str>> {
        Self::apply_env_from(settings, |key| std::env::var(key).ok())
    }

    /// Apply `CLIPIA_*` overrides from an arbitrary lookup. Returns the variables applied.
    pub fn apply_env_from<F>(settings: &mut Settings, lookup: F) -> ClipiaResult<Vec<&'static str>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = Vec::new();
        let mut take = |key: &'static str| -> Option<String> {
            let value = lookup(key).filter(|v| !v.trim().is_empty())?;
            debug!("Found environment override: {}", key);
            applied.push(key);
            Some(value.trim().to_string())
        };

        if let Some(v) = take("CLIPIA_BIND") {
            settings.server.bind = v;
        }
        if let Some(v) = take("CLIPIA_STORAGE_ROOT") {
            settings.storage.root = PathBuf::from(v);
        }
        if let Some(v) = take("CLIPIA_TEMP_DIR") {
            settings.storage.temp_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = take("CLIPIA_MAX_UPLOAD_BYTES") {
            settings.storage.max_upload_bytes = parse_number("CLIPIA_MAX_UPLOAD_BYTES", &v)?;
        }
        if let Some(v) = take("CLIPIA_TRIM_POLICY") {
            settings.trim.default_policy = v.parse()?;
        }
        if let Some(v) = take("CLIPIA_TRIM_TIMEOUT_SECS") {
            settings.trim.timeout_secs = parse_number("CLIPIA_TRIM_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = take("CLIPIA_TRIM_MAX_CONCURRENT") {
            settings.trim.max_concurrent = parse_number("CLIPIA_TRIM_MAX_CONCURRENT", &v)?;
        }
        if let Some(v) = take("CLIPIA_FFMPEG") {
            settings.trim.ffmpeg_path = v;
        }
        if let Some(v) = take("CLIPIA_FFPROBE") {
            settings.trim.ffprobe_path = v;
        }
        if let Some(v) = take("CLIPIA_WORKSPACE_SNAPSHOT") {
            settings.workspace.snapshot_path = Some(PathBuf::from(v));
        }
        if let Some(v) = take("CLIPIA_LOG_LEVEL") {
            settings.logging.level = v;
        }
        if let Some(v) = take("CLIPIA_LOG_FORMAT") {
            settings.logging.format = v.parse()?;
        }

        Ok(applied)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> ClipiaResult<T> {
    value
        .parse()
        .map_err(|_| ClipiaError::validation(format!("{} must be a number, got '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::TrimPolicy;
    use crate::utils::logging::LogFormat;
    use std::collections::HashMap;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = TomlConfigAdapter::from_toml_str(
            r#"
            [storage]
            root = "/srv/clipia"
            max_upload_bytes = 1048576

            [trim]
            default_policy = "exact"
            "#,
        )
        .unwrap();

        assert_eq!(settings.storage.root, PathBuf::from("/srv/clipia"));
        assert_eq!(settings.storage.max_upload_bytes, 1_048_576);
        assert_eq!(settings.trim.default_policy, TrimPolicy::Exact);
        assert_eq!(settings.trim.timeout_secs, 600);
        assert_eq!(settings.server.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_invalid_toml_is_validation_error() {
        let err = TomlConfigAdapter::from_toml_str("[trim]\ndefault_policy = \"turbo\"").unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML config"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("CLIPIA_BIND", "0.0.0.0:9000"),
            ("CLIPIA_TRIM_POLICY", "fast"),
            ("CLIPIA_TRIM_TIMEOUT_SECS", "30"),
            ("CLIPIA_LOG_FORMAT", "json"),
            ("CLIPIA_FFMPEG", ""),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        let applied = TomlConfigAdapter::apply_env_from(&mut settings, |key| {
            env.get(key).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(applied.len(), 4);
        assert_eq!(settings.server.bind, "0.0.0.0:9000");
        assert_eq!(settings.trim.default_policy, TrimPolicy::Fast);
        assert_eq!(settings.trim.timeout_secs, 30);
        assert_eq!(settings.logging.format, LogFormat::Json);
        assert_eq!(settings.trim.ffmpeg_path, "ffmpeg");
    }

    #[test]
    fn test_env_rejects_non_numeric() {
        let mut settings = Settings::default();
        let result = TomlConfigAdapter::apply_env_from(&mut settings, |key| {
            (key == "CLIPIA_MAX_UPLOAD_BYTES").then(|| "lots".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_load_file_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clipia.toml");
        std::fs::write(&path, "[server]\nbind = \"127.0.0.1:9999\"\n").unwrap();

        let settings = TomlConfigAdapter::load_file(Some(&path)).unwrap();
        assert_eq!(settings.server.bind, "127.0.0.1:9999");

        assert!(TomlConfigAdapter::load_file(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_locate_prefers_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        assert_eq!(TomlConfigAdapter::locate(Some(&path)), Some(path.clone()));
    }
}
