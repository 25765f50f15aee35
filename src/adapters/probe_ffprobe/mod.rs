//! FFprobe adapter for media file probing
//!
//! Runs the `ffprobe` CLI with JSON output and maps the result onto [`MediaInfo`].

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tracing::debug;

use crate::adapters::stderr_tail;
use crate::domain::model::*;
use crate::error::{ClipiaError, ClipiaResult};
use crate::ports::ProbePort;

/// FFprobe-based probe adapter
#[derive(Debug, Clone)]
pub struct FfprobeAdapter {
    ffprobe_path: String,
}

impl FfprobeAdapter {
    pub fn new(ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    async fn run(&self, args: &[&str], input: &Path) -> ClipiaResult<Vec<u8>> {
        let output = tokio::process::Command::new(&self.ffprobe_path)
            .args(args)
            .arg(input)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ClipiaError::processing(format!("Failed to run {}: {}", self.ffprobe_path, e))
            })?;

        if !output.status.success() {
            return Err(ClipiaError::UnsupportedFormat(format!(
                "ffprobe could not read {}: {}",
                input.display(),
                stderr_tail(&output.stderr)
            )));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl ProbePort for FfprobeAdapter {
    async fn probe_media(&self, path: &Path) -> ClipiaResult<MediaInfo> {
        debug!("Probing media: {}", path.display());
        let stdout = self
            .run(
                &["-v", "error", "-print_format", "json", "-show_format", "-show_streams"],
                path,
            )
            .await?;
        parse_probe_output(&String::from_utf8_lossy(&stdout))
    }

    async fn probe_keyframes(&self, path: &Path, stream_index: usize) -> ClipiaResult<Vec<f64>> {
        let selector = stream_index.to_string();
        let stdout = self
            .run(
                &[
                    "-v",
                    "error",
                    "-select_streams",
                    &selector,
                    "-show_entries",
                    "packet=pts_time,flags",
                    "-of",
                    "json",
                ],
                path,
            )
            .await?;
        let keyframes = parse_keyframe_output(&String::from_utf8_lossy(&stdout))?;
        debug!("Found {} keyframes in {}", keyframes.len(), path.display());
        Ok(keyframes)
    }
}

/// Parse `-show_format -show_streams` JSON
pub fn parse_probe_output(json_str: &str) -> ClipiaResult<MediaInfo> {
    let json: serde_json::Value = serde_json::from_str(json_str).map_err(|e| {
        ClipiaError::UnsupportedFormat(format!("Failed to parse ffprobe output: {}", e))
    })?;

    let format = json
        .get("format")
        .ok_or_else(|| ClipiaError::UnsupportedFormat("Missing format info".to_string()))?;

    let format_name = format
        .get("format_name")
        .and_then(|f| f.as_str())
        .unwrap_or("unknown")
        .to_string();

    let file_size = format
        .get("size")
        .and_then(|s| s.as_str())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let streams = json
        .get("streams")
        .and_then(|s| s.as_array())
        .cloned()
        .unwrap_or_default();

    let mut video: Option<VideoStreamInfo> = None;
    let mut audio: Option<AudioStreamInfo> = None;
    let mut video_duration: Option<f64> = None;

    for stream in &streams {
        match stream.get("codec_type").and_then(|c| c.as_str()) {
            Some("video") if video.is_none() && !is_attached_picture(stream) => {
                video_duration = string_f64(stream, "duration");
                video = Some(parse_video_stream(stream));
            }
            Some("audio") if audio.is_none() => {
                audio = Some(parse_audio_stream(stream));
            }
            _ => {}
        }
    }

    let duration = string_f64(format, "duration")
        .or(video_duration)
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| {
            ClipiaError::UnsupportedFormat("Could not determine media duration".to_string())
        })?;

    Ok(MediaInfo {
        duration,
        format: format_name,
        file_size,
        video,
        audio,
    })
}

/// Parse `-show_entries packet=pts_time,flags` JSON into sorted keyframe times
pub fn parse_keyframe_output(json_str: &str) -> ClipiaResult<Vec<f64>> {
    let json: serde_json::Value = serde_json::from_str(json_str).map_err(|e| {
        ClipiaError::UnsupportedFormat(format!("Failed to parse ffprobe packets: {}", e))
    })?;

    let mut keyframes: Vec<f64> = json
        .get("packets")
        .and_then(|p| p.as_array())
        .map(|packets| {
            packets
                .iter()
                .filter(|p| {
                    p.get("flags")
                        .and_then(|f| f.as_str())
                        .map_or(false, |f| f.starts_with('K'))
                })
                .filter_map(|p| string_f64(p, "pts_time"))
                .filter(|t| t.is_finite())
                .collect()
        })
        .unwrap_or_default();

    keyframes.sort_by(|a, b| a.total_cmp(b));
    keyframes.dedup();
    Ok(keyframes)
}

fn is_attached_picture(stream: &serde_json::Value) -> bool {
    stream
        .get("disposition")
        .and_then(|d| d.get("attached_pic"))
        .and_then(|a| a.as_u64())
        .map_or(false, |a| a == 1)
}

fn string_f64(value: &serde_json::Value, key: &str) -> Option<f64> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<f64>().ok())
}

/// Parse "30/1" or "30000/1001"
fn parse_rational(s: &str) -> Option<f64> {
    match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            (den > 0.0 && num > 0.0).then(|| num / den)
        }
        None => s.parse().ok().filter(|v: &f64| *v > 0.0),
    }
}

fn parse_video_stream(stream: &serde_json::Value) -> VideoStreamInfo {
    let frame_rate = ["avg_frame_rate", "r_frame_rate"]
        .iter()
        .filter_map(|key| stream.get(*key).and_then(|f| f.as_str()))
        .find_map(parse_rational)
        .unwrap_or(0.0);

    VideoStreamInfo {
        index: stream.get("index").and_then(|i| i.as_u64()).unwrap_or(0) as usize,
        codec: stream
            .get("codec_name")
            .and_then(|c| c.as_str())
            .unwrap_or("unknown")
            .to_string(),
        width: stream.get("width").and_then(|w| w.as_u64()).unwrap_or(0) as u32,
        height: stream.get("height").and_then(|h| h.as_u64()).unwrap_or(0) as u32,
        frame_rate,
    }
}

fn parse_audio_stream(stream: &serde_json::Value) -> AudioStreamInfo {
    AudioStreamInfo {
        index: stream.get("index").and_then(|i| i.as_u64()).unwrap_or(0) as usize,
        codec: stream
            .get("codec_name")
            .and_then(|c| c.as_str())
            .unwrap_or("unknown")
            .to_string(),
        sample_rate: stream
            .get("sample_rate")
            .and_then(|s| s.as_str())
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(0),
        channels: stream.get("channels").and_then(|c| c.as_u64()).unwrap_or(0) as u32,
    }
}
