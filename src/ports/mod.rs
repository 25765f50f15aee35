// Ports - Interface definitions (contracts)

use std::path::Path;

use async_trait::async_trait;

use crate::domain::model::*;
use crate::error::ClipiaResult;

/// Port for media file probing and analysis
#[async_trait]
pub trait ProbePort: Send + Sync {
    /// Probe a media file for duration and primary streams.
    ///
    /// Files that cannot be parsed fail with `UnsupportedFormat`.
    async fn probe_media(&self, path: &Path) -> ClipiaResult<MediaInfo>;

    /// Presentation times (seconds, ascending) of keyframes in a video stream
    async fn probe_keyframes(&self, path: &Path, stream_index: usize) -> ClipiaResult<Vec<f64>>;
}

/// How a single segment is cut from the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CutMethod {
    /// Packet copy starting at the keyframe at or before the segment start
    Copy,
    /// Decode and re-encode with the configured encoder
    Reencode,
}

/// Port for video execution and processing
#[async_trait]
pub trait ExecutePort: Send + Sync {
    /// Write `[start, end)` of `input` to `output` using `method`
    async fn cut_segment(
        &self,
        input: &Path,
        output: &Path,
        start: f64,
        end: f64,
        method: CutMethod,
    ) -> ClipiaResult<()>;

    /// Join already-cut segments, in order, into `output` without re-encoding
    async fn concat(&self, parts: &[std::path::PathBuf], output: &Path) -> ClipiaResult<()>;
}
