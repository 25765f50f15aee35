// Domain rules - Business logic and policies

use crate::domain::model::*;
use crate::error::{ClipiaError, ClipiaResult, RangeViolation};

/// Check the bounds that hold regardless of the source video
pub fn check_range(start: f64, end: f64) -> ClipiaResult<()> {
    if !start.is_finite() {
        return Err(RangeViolation::NonNumeric { field: "start_time" }.into());
    }
    if !end.is_finite() {
        return Err(RangeViolation::NonNumeric { field: "end_time" }.into());
    }
    if start < 0.0 {
        return Err(RangeViolation::Negative { field: "start_time" }.into());
    }
    if end < 0.0 {
        return Err(RangeViolation::Negative { field: "end_time" }.into());
    }
    if start >= end {
        return Err(RangeViolation::StartNotBeforeEnd { start, end }.into());
    }
    Ok(())
}

/// Check a range against the probed source duration
pub fn check_against_duration(start: f64, end: f64, duration: f64) -> ClipiaResult<()> {
    check_range(start, end)?;
    if end > duration {
        return Err(RangeViolation::EndBeyondDuration { end, duration }.into());
    }
    Ok(())
}

/// Media types accepted for ingestion, keyed by the stored extension
#[derive(Debug, Clone)]
pub struct AcceptedMedia {
    pub video_extensions: Vec<String>,
    pub image_extensions: Vec<String>,
}

/// Canonical content type for each extension the store knows about
const KNOWN_TYPES: &[(&str, &str, AssetKind)] = &[
    ("mp4", "video/mp4", AssetKind::Video),
    ("mov", "video/quicktime", AssetKind::Video),
    ("avi", "video/x-msvideo", AssetKind::Video),
    ("mkv", "video/x-matroska", AssetKind::Video),
    ("webm", "video/webm", AssetKind::Video),
    ("png", "image/png", AssetKind::Image),
    ("jpg", "image/jpeg", AssetKind::Image),
    ("gif", "image/gif", AssetKind::Image),
    ("webp", "image/webp", AssetKind::Image),
];

impl Default for AcceptedMedia {
    fn default() -> Self {
        let of_kind = |kind: AssetKind| {
            KNOWN_TYPES
                .iter()
                .filter(|(_, _, k)| *k == kind)
                .map(|(ext, _, _)| ext.to_string())
                .collect()
        };
        Self {
            video_extensions: of_kind(AssetKind::Video),
            image_extensions: of_kind(AssetKind::Image),
        }
    }
}

impl AcceptedMedia {
    /// Canonical content type for a stored extension
    pub fn content_type_for(extension: &str) -> Option<&'static str> {
        KNOWN_TYPES
            .iter()
            .find(|(ext, _, _)| *ext == extension)
            .map(|(_, content_type, _)| *content_type)
    }

    fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        let ext = match essence.as_str() {
            "video/mp4" => "mp4",
            "video/quicktime" => "mov",
            "video/x-msvideo" | "video/avi" | "video/msvideo" => "avi",
            "video/x-matroska" | "video/matroska" => "mkv",
            "video/webm" => "webm",
            "image/png" => "png",
            "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => return None,
        };
        Some(ext)
    }

    fn normalize_extension(ext: &str) -> String {
        match ext.to_ascii_lowercase().as_str() {
            "jpeg" => "jpg".to_string(),
            other => other.to_string(),
        }
    }

    fn allowed(&self, kind: AssetKind) -> &[String] {
        match kind {
            AssetKind::Video => &self.video_extensions,
            AssetKind::Image => &self.image_extensions,
        }
    }

    /// Decide the stored extension and content type for an upload.
    ///
    /// A specific content type wins; a generic one (absent or
    /// `application/octet-stream`) defers to the filename extension.
    pub fn resolve(
        &self,
        kind: AssetKind,
        content_type: Option<&str>,
        original_name: &str,
    ) -> ClipiaResult<(String, String)> {
        let declared = content_type
            .map(str::trim)
            .filter(|ct| !ct.is_empty() && !ct.eq_ignore_ascii_case("application/octet-stream"));

        let extension = match declared {
            Some(ct) => Self::extension_for_content_type(ct)
                .map(str::to_string)
                .ok_or_else(|| {
                    ClipiaError::validation(format!("Unsupported content type '{}' for {}", ct, kind))
                })?,
            None => crate::utils::path::extension_of(original_name)
                .map(|ext| Self::normalize_extension(&ext))
                .ok_or_else(|| {
                    ClipiaError::validation(format!(
                        "Cannot determine the {} type of '{}'",
                        kind, original_name
                    ))
                })?,
        };

        if !self.allowed(kind).iter().any(|allowed| *allowed == extension) {
            return Err(ClipiaError::validation(format!(
                "File type '{}' is not accepted for {} uploads",
                extension, kind
            )));
        }

        let canonical = Self::content_type_for(&extension)
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".to_string());
        Ok((canonical, extension))
    }
}

/// Trait for streams that support copy mode
pub trait StreamCopySupport {
    fn supports_copy(&self) -> bool;
}

impl StreamCopySupport for VideoStreamInfo {
    fn supports_copy(&self) -> bool {
        matches!(self.codec.as_str(), "h264" | "hevc" | "vp9" | "av1")
    }
}

impl StreamCopySupport for AudioStreamInfo {
    fn supports_copy(&self) -> bool {
        matches!(
            self.codec.as_str(),
            "aac" | "mp3" | "ac3" | "eac3" | "opus" | "vorbis" | "pcm_s16le"
        )
    }
}

/// Check if the container supports cutting by stream copy
fn container_supports_copy(format: &str) -> bool {
    format.split(',').any(|name| {
        matches!(
            name.trim(),
            "mp4" | "mov" | "matroska" | "webm" | "avi" | "mpegts"
        )
    })
}

/// Stream copy is only attempted when every mapped stream and the container allow it
pub fn copy_supported(info: &MediaInfo) -> bool {
    let video_ok = info.video.as_ref().map_or(false, |v| v.supports_copy());
    let audio_ok = info.audio.as_ref().map_or(true, |a| a.supports_copy());
    video_ok && audio_ok && container_supports_copy(&info.format)
}

/// Whether re-encoded libx264/aac segments can be joined with copied source segments
pub fn hybrid_compatible(info: &MediaInfo) -> bool {
    let video_ok = info.video.as_ref().map_or(false, |v| v.codec == "h264");
    let audio_ok = info.audio.as_ref().map_or(true, |a| a.codec == "aac");
    let container_ok = info
        .format
        .split(',')
        .any(|name| matches!(name.trim(), "mp4" | "mov" | "matroska" | "mpegts"));
    video_ok && audio_ok && container_ok
}

/// Container extension for a derived clip. libx264 output cannot go into webm.
pub fn output_extension(source_extension: &str, reencodes: bool) -> String {
    if reencodes && source_extension.eq_ignore_ascii_case("webm") {
        "mp4".to_string()
    } else {
        source_extension.to_ascii_lowercase()
    }
}

/// Shortest distance between consecutive split window starts (seconds)
pub const MIN_SPLIT_STEP: f64 = 1.0;
/// A trailing window shorter than this is merged into the one before it
pub const MIN_SPLIT_WINDOW: f64 = 1.0;
/// Most clips a single split may produce
pub const MAX_SPLIT_WINDOWS: usize = 200;

/// Overlapping windows covering `[0, duration]`.
///
/// Windows start every `clip - overlap` seconds and end at `min(start + clip, duration)`.
/// A video shorter than one window yields a single window. A tail shorter than
/// [`MIN_SPLIT_WINDOW`] extends the previous window instead of becoming its own clip.
pub fn split_windows(duration: f64, clip: f64, overlap: f64) -> ClipiaResult<Vec<(f64, f64)>> {
    if !(clip.is_finite() && clip > 0.0) {
        return Err(ClipiaError::validation("clip_seconds must be positive"));
    }
    if !(overlap.is_finite() && overlap >= 0.0) {
        return Err(ClipiaError::validation("overlap_seconds cannot be negative"));
    }
    if overlap >= clip {
        return Err(ClipiaError::validation(
            "overlap_seconds must be smaller than clip_seconds",
        ));
    }
    let step = clip - overlap;
    if step < MIN_SPLIT_STEP {
        return Err(ClipiaError::validation(format!(
            "clip_seconds minus overlap_seconds must be at least {}s",
            MIN_SPLIT_STEP
        )));
    }
    if !(duration.is_finite() && duration > 0.0) {
        return Err(ClipiaError::validation("video has no duration"));
    }

    if duration <= clip {
        return Ok(vec![(0.0, duration)]);
    }

    let count = ((duration - clip) / step).ceil() as usize + 1;
    if count > MAX_SPLIT_WINDOWS {
        return Err(ClipiaError::validation(format!(
            "Split would produce {} clips, the limit is {}",
            count, MAX_SPLIT_WINDOWS
        )));
    }

    let mut windows: Vec<(f64, f64)> = Vec::with_capacity(count);
    for i in 0..count {
        let start = i as f64 * step;
        if start >= duration {
            break;
        }
        let end = (start + clip).min(duration);
        match windows.last_mut() {
            Some(previous) if end - start < MIN_SPLIT_WINDOW => previous.1 = end,
            _ => windows.push((start, end)),
        }
        if end >= duration {
            break;
        }
    }
    Ok(windows)
}
