// Domain models - Core types and data structures

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ClipiaError, ClipiaResult, RangeViolation};

/// Opaque asset identifier: a v4 UUID rendered as 32 lowercase hex characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetId(String);

impl AssetId {
    /// Generate a fresh identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Accept only identifiers matching `^[0-9a-f]{32}$`
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = raw.len() == 32
            && raw
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AssetId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AssetId::parse(&value).ok_or_else(|| format!("invalid asset id: {}", value))
    }
}

impl From<AssetId> for String {
    fn from(id: AssetId) -> Self {
        id.0
    }
}

/// Kind of stored media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Video,
    Image,
}

impl AssetKind {
    pub const ALL: [AssetKind; 2] = [AssetKind::Video, AssetKind::Image];

    /// Directory under the store root holding this kind
    pub fn dir_name(&self) -> &'static str {
        match self {
            AssetKind::Video => "videos",
            AssetKind::Image => "images",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Video => "video",
            AssetKind::Image => "image",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A committed, immutable media object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub kind: AssetKind,
    /// Sanitized client filename, for display only
    pub original_name: String,
    pub size_bytes: u64,
    pub content_type: String,
    /// Extension of the stored data file, without the dot
    pub extension: String,
    pub sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_from: Option<AssetId>,
    pub created_at: DateTime<Utc>,
}

impl Asset {
    /// File name of the data file inside the kind directory
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.id, self.extension)
    }
}

/// Descriptor for an asset about to be ingested
#[derive(Debug, Clone)]
pub struct NewAsset {
    pub kind: AssetKind,
    pub original_name: String,
    pub content_type: String,
    pub extension: String,
    pub derived_from: Option<AssetId>,
}

/// Time specification with precision - represents time in seconds with fractional precision
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct TimeSpec {
    pub seconds: f64,
}

impl TimeSpec {
    /// Create a new TimeSpec from seconds
    pub fn from_seconds(seconds: f64) -> Self {
        Self { seconds }
    }

    /// Create a new TimeSpec from hours, minutes, seconds, milliseconds
    pub fn from_components(hours: u32, minutes: u32, seconds: u32, milliseconds: u32) -> Self {
        let total_seconds = hours as f64 * 3600.0
            + minutes as f64 * 60.0
            + seconds as f64
            + milliseconds as f64 / 1000.0;
        Self { seconds: total_seconds }
    }

    /// Validate a numeric value supplied for `field`
    pub fn from_number(field: &'static str, seconds: f64) -> ClipiaResult<Self> {
        if !seconds.is_finite() {
            return Err(RangeViolation::NonNumeric { field }.into());
        }
        if seconds < 0.0 {
            return Err(RangeViolation::Negative { field }.into());
        }
        Ok(Self::from_seconds(seconds))
    }

    /// Parse `SS(.ms)`, `MM:SS(.ms)` or `HH:MM:SS(.ms)` supplied for `field`
    pub fn parse(field: &'static str, time_str: &str) -> ClipiaResult<Self> {
        let trimmed = time_str.trim();

        if let Ok(seconds) = trimmed.parse::<f64>() {
            return Self::from_number(field, seconds);
        }

        let parts: Vec<&str> = trimmed.split(':').collect();
        let bad_format = || ClipiaError::from(RangeViolation::NonNumeric { field });
        if trimmed.starts_with('-') {
            return Err(RangeViolation::Negative { field }.into());
        }

        let (hours, minutes, seconds_part) = match parts.as_slice() {
            [m, s] => (0, m.parse::<u32>().map_err(|_| bad_format())?, *s),
            [h, m, s] => {
                let hours = h.parse::<u32>().map_err(|_| bad_format())?;
                let minutes = m.parse::<u32>().map_err(|_| bad_format())?;
                if minutes >= 60 {
                    return Err(ClipiaError::validation(format!(
                        "{} minutes must be less than 60",
                        field
                    )));
                }
                (hours, minutes, *s)
            }
            _ => return Err(bad_format()),
        };

        let seconds = seconds_part.parse::<f64>().map_err(|_| bad_format())?;
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(bad_format());
        }
        if seconds >= 60.0 {
            return Err(ClipiaError::validation(format!(
                "{} seconds must be less than 60",
                field
            )));
        }

        Ok(Self::from_seconds(
            hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds,
        ))
    }

    /// Format as HH:MM:SS.mmm (hours omitted when zero)
    pub fn format_hms(&self) -> String {
        let total_ms = (self.seconds * 1000.0).round() as u64;
        let hours = total_ms / 3_600_000;
        let minutes = (total_ms % 3_600_000) / 60_000;
        let seconds = (total_ms % 60_000) / 1000;
        let milliseconds = total_ms % 1000;

        if hours > 0 {
            format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, milliseconds)
        } else {
            format!("{:02}:{:02}.{:03}", minutes, seconds, milliseconds)
        }
    }
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_hms())
    }
}

/// How a trim is carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrimPolicy {
    /// Always re-encode; frame accurate
    Exact,
    /// Stream copy from the keyframe at or before start
    Fast,
    /// Copy when aligned, otherwise re-encode only the partial GOPs at the edges
    #[default]
    Smart,
}

impl TrimPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrimPolicy::Exact => "exact",
            TrimPolicy::Fast => "fast",
            TrimPolicy::Smart => "smart",
        }
    }
}

impl fmt::Display for TrimPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrimPolicy {
    type Err = ClipiaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(TrimPolicy::Exact),
            "fast" => Ok(TrimPolicy::Fast),
            "smart" => Ok(TrimPolicy::Smart),
            other => Err(ClipiaError::validation(format!(
                "Unknown trim policy '{}'. Expected exact, fast or smart",
                other
            ))),
        }
    }
}

/// Validated trim request. Never persisted.
#[derive(Debug, Clone)]
pub struct TrimRequest {
    pub source: AssetId,
    pub start: TimeSpec,
    pub end: TimeSpec,
    pub policy: Option<TrimPolicy>,
}

impl TrimRequest {
    /// Checks everything that can be checked without probing the source
    pub fn new(source: AssetId, start: TimeSpec, end: TimeSpec) -> ClipiaResult<Self> {
        crate::domain::rules::check_range(start.seconds, end.seconds)?;
        Ok(Self {
            source,
            start,
            end,
            policy: None,
        })
    }

    pub fn with_policy(mut self, policy: TrimPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn duration(&self) -> f64 {
        self.end.seconds - self.start.seconds
    }
}

/// Video stream information
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoStreamInfo {
    pub index: usize,
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
}

impl VideoStreamInfo {
    /// Get frame duration in seconds
    pub fn frame_duration(&self) -> f64 {
        if self.frame_rate > 0.0 {
            1.0 / self.frame_rate
        } else {
            DEFAULT_FRAME_DURATION
        }
    }
}

/// Audio stream information
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioStreamInfo {
    pub index: usize,
    pub codec: String,
    pub sample_rate: u32,
    pub channels: u32,
}

/// Frame duration assumed when a stream reports no usable rate (30 fps)
pub const DEFAULT_FRAME_DURATION: f64 = 1.0 / 30.0;

/// Complete media file information
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaInfo {
    pub duration: f64,
    /// Container names as reported by ffprobe, e.g. `mov,mp4,m4a,3gp,3g2,mj2`
    pub format: String,
    pub file_size: u64,
    pub video: Option<VideoStreamInfo>,
    pub audio: Option<AudioStreamInfo>,
}

impl MediaInfo {
    pub fn frame_duration(&self) -> f64 {
        self.video
            .as_ref()
            .map(VideoStreamInfo::frame_duration)
            .unwrap_or(DEFAULT_FRAME_DURATION)
    }
}
