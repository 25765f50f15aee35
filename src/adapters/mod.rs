// Adapters - External system implementations

pub mod exec_ffmpeg;
pub mod probe_ffprobe;
pub mod toml_config;

// Re-export adapters
pub use exec_ffmpeg::{EncoderSettings, FfmpegAdapter};
pub use probe_ffprobe::FfprobeAdapter;
pub use toml_config::TomlConfigAdapter;

const STDERR_TAIL_LINES: usize = 8;

/// Last few lines of a child's stderr, for logs only
pub(crate) fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}
