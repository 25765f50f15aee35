//! FFmpeg execution adapter
//!
//! Each operation is a single `ffmpeg` child process. Children are killed when
//! their future is dropped, so a timed-out trim leaves no process behind.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tracing::debug;

use crate::adapters::stderr_tail;
use crate::config::TrimSettings;
use crate::error::{ClipiaError, ClipiaResult};
use crate::ports::{CutMethod, ExecutePort};

/// Encoder settings used for re-encoded segments
#[derive(Debug, Clone)]
pub struct EncoderSettings {
    pub video_encoder: String,
    pub audio_encoder: String,
    pub preset: String,
    pub crf: u8,
}

impl From<&TrimSettings> for EncoderSettings {
    fn from(settings: &TrimSettings) -> Self {
        Self {
            video_encoder: settings.video_encoder.clone(),
            audio_encoder: settings.audio_encoder.clone(),
            preset: settings.preset.clone(),
            crf: settings.crf,
        }
    }
}

/// FFmpeg-based execution adapter
#[derive(Debug, Clone)]
pub struct FfmpegAdapter {
    ffmpeg_path: String,
    encoder: EncoderSettings,
}

impl FfmpegAdapter {
    pub fn new(ffmpeg_path: impl Into<String>, encoder: EncoderSettings) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            encoder,
        }
    }

    /// Arguments for cutting one segment
    pub fn cut_args(
        &self,
        input: &Path,
        output: &Path,
        start: f64,
        end: f64,
        method: CutMethod,
    ) -> Vec<String> {
        let mut args: Vec<String> = vec!["-hide_banner".into(), "-nostdin".into(), "-y".into()];

        match method {
            CutMethod::Copy => {
                // input seeking snaps to the keyframe at or before start
                args.extend([
                    "-ss".into(),
                    format_seconds(start),
                    "-i".into(),
                    input.to_string_lossy().into_owned(),
                    "-t".into(),
                    format_seconds(end - start),
                    "-map".into(),
                    "0:v:0".into(),
                    "-map".into(),
                    "0:a:0?".into(),
                    "-c".into(),
                    "copy".into(),
                    "-avoid_negative_ts".into(),
                    "make_zero".into(),
                ]);
            }
            CutMethod::Reencode => {
                args.extend([
                    "-ss".into(),
                    format_seconds(start),
                    "-i".into(),
                    input.to_string_lossy().into_owned(),
                    "-t".into(),
                    format_seconds(end - start),
                    "-map".into(),
                    "0:v:0".into(),
                    "-map".into(),
                    "0:a:0?".into(),
                    "-c:v".into(),
                    self.encoder.video_encoder.clone(),
                    "-preset".into(),
                    self.encoder.preset.clone(),
                    "-crf".into(),
                    self.encoder.crf.to_string(),
                    "-pix_fmt".into(),
                    "yuv420p".into(),
                    "-c:a".into(),
                    self.encoder.audio_encoder.clone(),
                ]);
            }
        }

        if output_is_mp4_family(output) {
            args.extend(["-movflags".into(), "+faststart".into()]);
        }
        args.push(output.to_string_lossy().into_owned());
        args
    }

    async fn run(&self, args: &[String], what: &str) -> ClipiaResult<()> {
        debug!("Running {} {}", self.ffmpeg_path, args.join(" "));
        let output = tokio::process::Command::new(&self.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ClipiaError::processing(format!("Failed to run {}: {}", self.ffmpeg_path, e))
            })?;

        if !output.status.success() {
            return Err(ClipiaError::processing(format!(
                "{} failed ({}): {}",
                what,
                output.status,
                stderr_tail(&output.stderr)
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ExecutePort for FfmpegAdapter {
    async fn cut_segment(
        &self,
        input: &Path,
        output: &Path,
        start: f64,
        end: f64,
        method: CutMethod,
    ) -> ClipiaResult<()> {
        let args = self.cut_args(input, output, start, end, method);
        self.run(&args, "segment cut").await
    }

    async fn concat(&self, parts: &[PathBuf], output: &Path) -> ClipiaResult<()> {
        let list_dir = output.parent().unwrap_or_else(|| Path::new("."));
        let list_path = list_dir.join("concat_list.txt");
        tokio::fs::write(&list_path, concat_list(parts)).await?;

        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-nostdin".into(),
            "-y".into(),
            "-f".into(),
            "concat".into(),
            "-safe".into(),
            "0".into(),
            "-i".into(),
            list_path.to_string_lossy().into_owned(),
            "-c".into(),
            "copy".into(),
        ];
        if output_is_mp4_family(output) {
            args.extend(["-movflags".into(), "+faststart".into()]);
        }
        args.push(output.to_string_lossy().into_owned());

        self.run(&args, "segment concat").await
    }
}

/// Concat demuxer list; single quotes are closed, escaped and reopened
pub fn concat_list(parts: &[PathBuf]) -> String {
    parts
        .iter()
        .map(|p| format!("file '{}'\n", p.to_string_lossy().replace('\'', "'\\''")))
        .collect()
}

fn format_seconds(seconds: f64) -> String {
    format!("{:.6}", seconds.max(0.0))
}

fn output_is_mp4_family(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| matches!(e, "mp4" | "mov"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> FfmpegAdapter {
        FfmpegAdapter::new("ffmpeg", EncoderSettings::from(&TrimSettings::default()))
    }

    #[test]
    fn test_copy_args() {
        let args = adapter().cut_args(
            Path::new("/in/source.mp4"),
            Path::new("/out/part.mp4"),
            2.0,
            5.5,
            CutMethod::Copy,
        );
        let joined = args.join(" ");
        assert!(joined.contains("-ss 2.000000 -i /in/source.mp4 -t 3.500000"));
        assert!(joined.contains("-c copy"));
        assert!(joined.contains("+faststart"));
        assert_eq!(args.last().unwrap(), "/out/part.mp4");
    }

    #[test]
    fn test_reencode_args() {
        let args = adapter().cut_args(
            Path::new("in.mkv"),
            Path::new("out.mkv"),
            0.0,
            1.0,
            CutMethod::Reencode,
        );
        let joined = args.join(" ");
        assert!(joined.contains("-c:v libx264 -preset veryfast -crf 18"));
        assert!(joined.contains("-c:a aac"));
        assert!(!joined.contains("faststart"));
    }

    #[test]
    fn test_concat_list_escapes_quotes() {
        let list = concat_list(&[PathBuf::from("/tmp/a.mp4"), PathBuf::from("/tmp/it's.mp4")]);
        assert_eq!(list, "file '/tmp/a.mp4'\nfile '/tmp/it'\\''s.mp4'\n");
    }
}
