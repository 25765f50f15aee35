//! Output verification implementation

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{ClipiaError, ClipiaResult};
use crate::planner::CutPlan;
use crate::ports::ProbePort;

/// Container-level duration includes audio priming and frame padding
pub const MEASUREMENT_SLACK: f64 = 0.1;

/// Outcome of checking a produced clip against its plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationResult {
    pub expected_duration: f64,
    pub actual_duration: f64,
    pub tolerance: f64,
    pub passed: bool,
}

impl VerificationResult {
    pub fn difference(&self) -> f64 {
        (self.actual_duration - self.expected_duration).abs()
    }
}

/// Compare a measured duration with the plan's tolerance
pub fn check_duration(plan: &CutPlan, actual_duration: f64) -> VerificationResult {
    let tolerance = plan.tolerance + MEASUREMENT_SLACK;
    let passed = actual_duration.is_finite()
        && (actual_duration - plan.expected_duration).abs() <= tolerance;
    VerificationResult {
        expected_duration: plan.expected_duration,
        actual_duration,
        tolerance,
        passed,
    }
}

/// Output file verifier
pub struct ClipVerifier<'a> {
    probe: &'a dyn ProbePort,
}

impl<'a> ClipVerifier<'a> {
    pub fn new(probe: &'a dyn ProbePort) -> Self {
        Self { probe }
    }

    /// Probe a produced clip and fail unless it has video and the planned duration
    pub async fn verify(&self, output: &Path, plan: &CutPlan) -> ClipiaResult<VerificationResult> {
        let info = self.probe.probe_media(output).await.map_err(|e| {
            ClipiaError::processing(format!("Produced clip is unreadable: {}", e))
        })?;

        if info.video.is_none() {
            return Err(ClipiaError::processing("Produced clip has no video stream"));
        }

        let result = check_duration(plan, info.duration);
        if result.passed {
            info!(
                "Verification passed: {:.3}s (expected {:.3}s ± {:.3}s)",
                result.actual_duration, result.expected_duration, result.tolerance
            );
            Ok(result)
        } else {
            warn!("Verification failed: {:?}", result);
            Err(ClipiaError::processing(format!(
                "Produced clip is {:.3}s, expected {:.3}s ± {:.3}s",
                result.actual_duration, result.expected_duration, result.tolerance
            )))
        }
    }
}
