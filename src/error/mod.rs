//! Error handling module for Clipia

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Which trim bound a request violated
#[derive(Debug, Clone, PartialEq)]
pub enum RangeViolation {
    /// A time field could not be read as a number
    NonNumeric { field: &'static str },
    /// A time field was below zero
    Negative { field: &'static str },
    /// Start was not strictly before end
    StartNotBeforeEnd { start: f64, end: f64 },
    /// End went past the probed source duration
    EndBeyondDuration { end: f64, duration: f64 },
}

impl fmt::Display for RangeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeViolation::NonNumeric { field } => write!(f, "{} must be a number", field),
            RangeViolation::Negative { field } => write!(f, "{} cannot be negative", field),
            RangeViolation::StartNotBeforeEnd { start, end } => write!(
                f,
                "start_time ({:.3}s) must be less than end_time ({:.3}s)",
                start, end
            ),
            RangeViolation::EndBeyondDuration { end, duration } => write!(
                f,
                "end_time ({:.3}s) exceeds video duration ({:.3}s)",
                end, duration
            ),
        }
    }
}

/// Main error type for Clipia operations
#[derive(Error, Debug)]
pub enum ClipiaError {
    /// Malformed request or rejected input
    #[error("{0}")]
    Validation(String),

    /// Trim range outside the allowed bounds
    #[error("Invalid time range: {0}")]
    InvalidRange(RangeViolation),

    /// Unknown asset identifier
    #[error("Asset not found: {id}")]
    NotFound { id: String },

    /// Media that ffprobe cannot read, or that lacks a video stream
    #[error("Unsupported media format: {0}")]
    UnsupportedFormat(String),

    /// ffmpeg failure or output verification failure
    #[error("Processing failed: {0}")]
    Processing(String),

    /// Trim exceeded its wall-clock budget
    #[error("Processing timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// I/O error
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
}

/// Coarse error classification shared by the store, engine and HTTP layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    UnsupportedFormat,
    Processing,
    Timeout,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::UnsupportedFormat => "unsupported_format",
            ErrorKind::Processing => "processing",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Storage => "storage",
        }
    }
}

impl ClipiaError {
    pub fn validation(message: impl Into<String>) -> Self {
        ClipiaError::Validation(message.into())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        ClipiaError::NotFound { id: id.into() }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        ClipiaError::Processing(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ClipiaError::Validation(_) | ClipiaError::InvalidRange(_) => ErrorKind::Validation,
            ClipiaError::NotFound { .. } => ErrorKind::NotFound,
            ClipiaError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            ClipiaError::Processing(_) => ErrorKind::Processing,
            ClipiaError::Timeout(_) => ErrorKind::Timeout,
            ClipiaError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Message safe to hand to a client.
    ///
    /// Processing, storage and format errors carry ffprobe/ffmpeg stderr, paths or OS error text, which stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            ClipiaError::Processing(_) => "Video processing failed.".to_string(),
            ClipiaError::Timeout(_) => "Video processing timed out.".to_string(),
            ClipiaError::Storage(_) => "Storage failure.".to_string(),
            ClipiaError::NotFound { .. } => "Asset not found.".to_string(),
            ClipiaError::UnsupportedFormat(_) => "Unsupported media format.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<RangeViolation> for ClipiaError {
    fn from(violation: RangeViolation) -> Self {
        ClipiaError::InvalidRange(violation)
    }
}

/// Result type alias for Clipia operations
pub type ClipiaResult<T> = std::result::Result<T, ClipiaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(ClipiaError::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(
            ClipiaError::from(RangeViolation::Negative { field: "start_time" }).kind(),
            ErrorKind::Validation
        );
        assert_eq!(ClipiaError::not_found("abc").kind(), ErrorKind::NotFound);
        assert_eq!(
            ClipiaError::Timeout(Duration::from_secs(3)).kind(),
            ErrorKind::Timeout
        );
    }

    #[test]
    fn test_client_message_hides_internal_detail() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "/srv/clipia/videos: disk full");
        let err = ClipiaError::from(io);
        assert!(!err.client_message().contains("/srv"));

        let err = ClipiaError::processing("ffmpeg: moov atom not found in /tmp/x");
        assert!(!err.client_message().contains("moov"));

        let err = ClipiaError::UnsupportedFormat(
            "ffprobe could not read /srv/clipia/videos/abc.mp4: moov atom not found".to_string(),
        );
        assert_eq!(err.client_message(), "Unsupported media format.");
    }

    #[test]
    fn test_range_violation_names_bound() {
        let err = ClipiaError::from(RangeViolation::EndBeyondDuration {
            end: 12.0,
            duration: 10.0,
        });
        assert!(err.client_message().contains("exceeds video duration"));
    }
}
