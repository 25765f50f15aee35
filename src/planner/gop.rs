//! GOP (Group of Pictures) analysis utilities

/// Sorted keyframe times of one video stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyframeIndex {
    times: Vec<f64>,
}

impl KeyframeIndex {
    /// Build from raw keyframe times in any order
    pub fn new(mut times: Vec<f64>) -> Self {
        times.retain(|t| t.is_finite() && *t >= 0.0);
        times.sort_by(|a, b| a.total_cmp(b));
        times.dedup();
        Self { times }
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Latest keyframe at or before `t`, allowing `tolerance` of slack
    pub fn at_or_before(&self, t: f64, tolerance: f64) -> Option<f64> {
        let idx = self.times.partition_point(|k| *k <= t + tolerance);
        idx.checked_sub(1).map(|i| self.times[i])
    }

    /// Earliest keyframe at or after `t`, allowing `tolerance` of slack
    pub fn at_or_after(&self, t: f64, tolerance: f64) -> Option<f64> {
        let idx = self.times.partition_point(|k| *k < t - tolerance);
        self.times.get(idx).copied()
    }

    /// Whether a keyframe sits within `tolerance` of `t`
    pub fn is_aligned(&self, t: f64, tolerance: f64) -> bool {
        self.at_or_before(t, tolerance)
            .map_or(false, |k| (t - k).abs() <= tolerance)
    }

    /// Largest gap between keyframes, counting the tail up to `duration`
    pub fn max_interval(&self, duration: f64) -> Option<f64> {
        let last = *self.times.last()?;
        let inner = self
            .times
            .windows(2)
            .map(|w| w[1] - w[0])
            .fold(0.0_f64, f64::max);
        Some(inner.max(duration - last).max(0.0))
    }

    /// Average GOP length in seconds
    pub fn average_interval(&self) -> Option<f64> {
        if self.times.len() < 2 {
            return None;
        }
        let span = self.times[self.times.len() - 1] - self.times[0];
        Some(span / (self.times.len() - 1) as f64)
    }
}
