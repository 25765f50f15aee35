//! Main video clipper implementation

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use crate::error::ClipiaResult;
use crate::planner::CutPlan;
use crate::ports::ExecutePort;

/// Runs a [`CutPlan`] against the execute port inside a scratch directory
pub struct VideoClipper<'a> {
    exec: &'a dyn ExecutePort,
}

impl<'a> VideoClipper<'a> {
    pub fn new(exec: &'a dyn ExecutePort) -> Self {
        Self { exec }
    }

    /// Produce `<scratch>/output.<extension>` and return its path
    pub async fn clip(
        &self,
        input: &Path,
        plan: &CutPlan,
        scratch: &Path,
        extension: &str,
    ) -> ClipiaResult<PathBuf> {
        let started = Instant::now();
        let output = scratch.join(format!("output.{}", extension));

        if let [segment] = plan.segments.as_slice() {
            debug!("Single {:?} segment {:.3}s - {:.3}s", segment.method, segment.start, segment.end);
            self.exec
                .cut_segment(input, &output, segment.start, segment.end, segment.method)
                .await?;
        } else {
            let mut parts = Vec::with_capacity(plan.segments.len());
            for (i, segment) in plan.segments.iter().enumerate() {
                let part = scratch.join(format!("part_{}.{}", i, extension));
                debug!(
                    "Segment {}: {:?} {:.3}s - {:.3}s",
                    i, segment.method, segment.start, segment.end
                );
                self.exec
                    .cut_segment(input, &part, segment.start, segment.end, segment.method)
                    .await?;
                parts.push(part);
            }
            self.exec.concat(&parts, &output).await?;
        }

        info!(
            "Clip produced with {} policy in {:.2}s",
            plan.policy,
            started.elapsed().as_secs_f64()
        );
        Ok(output)
    }
}
