//! Clipping strategy implementation

use tracing::{debug, info, warn};

use crate::domain::model::{MediaInfo, TrimPolicy};
use crate::domain::rules;
use crate::planner::{CutPlan, KeyframeIndex, Segment};
use crate::ports::CutMethod;

/// Strategy planner for determining the cut segments of a trim
#[derive(Debug, Clone)]
pub struct StrategyPlanner {
    /// Minimum middle-section duration to justify the hybrid approach (seconds)
    min_copy_duration: f64,
}

impl Default for StrategyPlanner {
    fn default() -> Self {
        Self {
            min_copy_duration: 2.0,
        }
    }
}

impl StrategyPlanner {
    pub fn new(min_copy_duration: f64) -> Self {
        Self { min_copy_duration }
    }

    /// Plan how `[start, end]` of the probed source is produced under `policy`
    pub fn plan(
        &self,
        policy: TrimPolicy,
        info: &MediaInfo,
        keyframes: &KeyframeIndex,
        start: f64,
        end: f64,
    ) -> CutPlan {
        info!("Planning {} trim: {:.3}s - {:.3}s", policy, start, end);

        match policy {
            TrimPolicy::Exact => self.exact(policy, info, start, end),
            TrimPolicy::Fast => self.fast(info, keyframes, start, end),
            TrimPolicy::Smart => self.smart(info, keyframes, start, end),
        }
    }

    fn exact(&self, requested: TrimPolicy, info: &MediaInfo, start: f64, end: f64) -> CutPlan {
        CutPlan {
            requested,
            policy: TrimPolicy::Exact,
            segments: vec![Segment {
                start,
                end,
                method: CutMethod::Reencode,
            }],
            expected_duration: end - start,
            tolerance: info.frame_duration(),
        }
    }

    fn fast(&self, info: &MediaInfo, keyframes: &KeyframeIndex, start: f64, end: f64) -> CutPlan {
        if !rules::copy_supported(info) || keyframes.is_empty() {
            warn!("Stream copy not possible for this source, using re-encode");
            return self.exact(TrimPolicy::Fast, info, start, end);
        }

        let frame = info.frame_duration();
        let copy_start = keyframes.at_or_before(start, frame / 2.0).unwrap_or(0.0);
        let gop = keyframes.max_interval(info.duration).unwrap_or(info.duration);
        debug!(
            "Fast trim starts at keyframe {:.3}s (requested {:.3}s)",
            copy_start, start
        );

        CutPlan {
            requested: TrimPolicy::Fast,
            policy: TrimPolicy::Fast,
            segments: vec![Segment {
                start: copy_start,
                end,
                method: CutMethod::Copy,
            }],
            expected_duration: end - start,
            tolerance: gop + frame,
        }
    }

    fn smart(&self, info: &MediaInfo, keyframes: &KeyframeIndex, start: f64, end: f64) -> CutPlan {
        let frame = info.frame_duration();
        let align = frame / 2.0;
        let duration = end - start;

        if !rules::copy_supported(info) || keyframes.is_empty() {
            info!("Stream copy not possible, using full re-encoding");
            return self.exact(TrimPolicy::Smart, info, start, end);
        }

        let start_aligned = keyframes.is_aligned(start, align);
        // cutting at the very end of the source needs no trailing keyframe
        let end_aligned = keyframes.is_aligned(end, align) || (info.duration - end).abs() <= align;

        if start_aligned && end_aligned {
            debug!("Both cuts align with keyframes, using full stream copy");
            return CutPlan {
                requested: TrimPolicy::Smart,
                policy: TrimPolicy::Smart,
                segments: vec![Segment {
                    start,
                    end,
                    method: CutMethod::Copy,
                }],
                expected_duration: duration,
                tolerance: 2.0 * frame,
            };
        }

        if !rules::hybrid_compatible(info) {
            info!("Source codecs cannot be joined with encoder output, using full re-encoding");
            return self.exact(TrimPolicy::Smart, info, start, end);
        }

        if !start_aligned && !end_aligned && duration < self.min_copy_duration * 3.0 {
            debug!("Short clip with no keyframe alignment, using full re-encoding");
            return self.exact(TrimPolicy::Smart, info, start, end);
        }

        let middle_start = if start_aligned {
            start
        } else {
            keyframes.at_or_after(start, 0.0).unwrap_or(end)
        };
        let middle_end = if end_aligned {
            end
        } else {
            keyframes.at_or_before(end, 0.0).unwrap_or(start)
        };

        let middle = middle_end - middle_start;
        if middle < self.min_copy_duration {
            debug!("Middle segment too short ({:.2}s), using full re-encoding", middle);
            return self.exact(TrimPolicy::Smart, info, start, end);
        }

        let mut segments = Vec::with_capacity(3);
        if middle_start - start > align {
            segments.push(Segment {
                start,
                end: middle_start,
                method: CutMethod::Reencode,
            });
        }
        segments.push(Segment {
            start: middle_start,
            end: middle_end,
            method: CutMethod::Copy,
        });
        if end - middle_end > align {
            segments.push(Segment {
                start: middle_end,
                end,
                method: CutMethod::Reencode,
            });
        }

        info!(
            "Using three-way hybrid: leading {:.2}s, middle {:.2}s, trailing {:.2}s",
            middle_start - start,
            middle,
            end - middle_end
        );

        CutPlan {
            requested: TrimPolicy::Smart,
            policy: TrimPolicy::Smart,
            segments,
            expected_duration: duration,
            tolerance: 2.0 * frame,
        }
    }
}
