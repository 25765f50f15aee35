//! Shared fakes for engine and HTTP tests
//!
//! The fake executor writes `clip <start> <end>` into each output file and the
//! fake probe reads it back, so a produced clip reports exactly the duration
//! that was cut. Anything else is treated as a 10 second h264/aac source.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use clipia::domain::model::{AudioStreamInfo, MediaInfo, TrimPolicy, VideoStreamInfo};
use clipia::domain::rules::AcceptedMedia;
use clipia::engine::{EngineConfig, TrimEngine};
use clipia::error::{ClipiaError, ClipiaResult};
use clipia::ports::{CutMethod, ExecutePort, ProbePort};
use clipia::store::AssetStore;

pub const SOURCE_DURATION: f64 = 10.0;
pub const KEYFRAME_INTERVAL: f64 = 2.0;

fn parse_clip(bytes: &[u8]) -> Option<(f64, f64)> {
    let text = std::str::from_utf8(bytes).ok()?;
    let mut parts = text.strip_prefix("clip ")?.split_whitespace();
    let start = parts.next()?.parse().ok()?;
    let end = parts.next()?.parse().ok()?;
    Some((start, end))
}

fn media(duration: f64) -> MediaInfo {
    MediaInfo {
        duration,
        format: "mov,mp4,m4a,3gp,3g2,mj2".to_string(),
        file_size: 1024,
        video: Some(VideoStreamInfo {
            index: 0,
            codec: "h264".to_string(),
            width: 320,
            height: 240,
            frame_rate: 30.0,
        }),
        audio: Some(AudioStreamInfo {
            index: 1,
            codec: "aac".to_string(),
            sample_rate: 48000,
            channels: 2,
        }),
    }
}

#[derive(Default)]
pub struct FakeProbe;

#[async_trait]
impl ProbePort for FakeProbe {
    async fn probe_media(&self, path: &Path) -> ClipiaResult<MediaInfo> {
        let bytes = tokio::fs::read(path).await?;
        match parse_clip(&bytes) {
            Some((start, end)) => Ok(media(end - start)),
            None if bytes.starts_with(b"not media") => Err(ClipiaError::UnsupportedFormat(
                "Invalid data found when processing input".to_string(),
            )),
            None => Ok(media(SOURCE_DURATION)),
        }
    }

    async fn probe_keyframes(&self, _path: &Path, _stream_index: usize) -> ClipiaResult<Vec<f64>> {
        let count = (SOURCE_DURATION / KEYFRAME_INTERVAL) as usize;
        Ok((0..count).map(|i| i as f64 * KEYFRAME_INTERVAL).collect())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Succeed,
    Fail,
    Hang(Duration),
}

pub struct FakeExecutor {
    behavior: Behavior,
    pub cuts: AtomicUsize,
    pub concats: AtomicUsize,
}

impl FakeExecutor {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            cuts: AtomicUsize::new(0),
            concats: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ExecutePort for FakeExecutor {
    async fn cut_segment(
        &self,
        _input: &Path,
        output: &Path,
        start: f64,
        end: f64,
        _method: CutMethod,
    ) -> ClipiaResult<()> {
        self.cuts.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Fail => Err(ClipiaError::processing(
                "ffmpeg exited with status 1: Conversion failed!",
            )),
            Behavior::Hang(delay) => {
                tokio::fs::write(output, format!("clip {} {}", start, end)).await?;
                tokio::time::sleep(delay).await;
                Ok(())
            }
            Behavior::Succeed => {
                tokio::fs::write(output, format!("clip {} {}", start, end)).await?;
                Ok(())
            }
        }
    }

    async fn concat(&self, parts: &[PathBuf], output: &Path) -> ClipiaResult<()> {
        self.concats.fetch_add(1, Ordering::SeqCst);
        let mut first = f64::MAX;
        let mut last = f64::MIN;
        for part in parts {
            let bytes = tokio::fs::read(part).await?;
            let (start, end) = parse_clip(&bytes)
                .ok_or_else(|| ClipiaError::processing("unreadable segment"))?;
            first = first.min(start);
            last = last.max(end);
        }
        tokio::fs::write(output, format!("clip {} {}", first, last)).await?;
        Ok(())
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub store: AssetStore,
    pub engine: TrimEngine,
    pub exec: Arc<FakeExecutor>,
}

impl Harness {
    pub fn scratch_dir(&self) -> PathBuf {
        self.dir.path().join("scratch")
    }

    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.scratch_dir())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

pub fn engine_config(dir: &Path, timeout: Duration, policy: TrimPolicy) -> EngineConfig {
    EngineConfig {
        scratch_dir: dir.join("scratch"),
        timeout,
        max_concurrent: 2,
        default_policy: policy,
        min_copy_duration: 2.0,
        split_clip_seconds: 4.0,
        split_overlap_seconds: 1.0,
    }
}

pub async fn harness(behavior: Behavior) -> Harness {
    harness_with(behavior, Duration::from_secs(5), TrimPolicy::Smart).await
}

pub async fn harness_with(behavior: Behavior, timeout: Duration, policy: TrimPolicy) -> Harness {
    let dir = TempDir::new().unwrap();
    let store = AssetStore::open(dir.path().join("store"), 1024 * 1024, AcceptedMedia::default())
        .await
        .unwrap();
    let exec = Arc::new(FakeExecutor::new(behavior));
    let engine = TrimEngine::new(
        store.clone(),
        Arc::new(FakeProbe),
        exec.clone(),
        engine_config(dir.path(), timeout, policy),
    )
    .await
    .unwrap();
    Harness {
        dir,
        store,
        engine,
        exec,
    }
}
