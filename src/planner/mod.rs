//! Cut strategy planning and GOP analysis module

use serde::Serialize;

use crate::domain::model::TrimPolicy;
use crate::ports::CutMethod;

pub mod gop;
pub mod strategy;

pub use gop::KeyframeIndex;
pub use strategy::StrategyPlanner;

/// One contiguous piece of the output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub method: CutMethod,
}

impl Segment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Cut plan information
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutPlan {
    /// Policy the caller asked for
    pub requested: TrimPolicy,
    /// Policy actually carried out after fallbacks
    pub policy: TrimPolicy,
    /// Segments in output order
    pub segments: Vec<Segment>,
    /// `end - start` of the request
    pub expected_duration: f64,
    /// Allowed difference between produced and expected duration
    pub tolerance: f64,
}

impl CutPlan {
    /// Whether any segment goes through the encoder
    pub fn reencodes(&self) -> bool {
        self.segments.iter().any(|s| s.method == CutMethod::Reencode)
    }

    /// Whether the output is assembled from several segments
    pub fn needs_concat(&self) -> bool {
        self.segments.len() > 1
    }
}
