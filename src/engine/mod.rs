//! Trim engine: turns a stored video and a time range into a new derived asset
//!
//! Every job runs on its own task, bounded by a semaphore and a wall-clock
//! budget. Intermediate files live in a per-job scratch directory that is
//! removed however the job ends.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use crate::config::Settings;
use crate::domain::model::*;
use crate::domain::rules::{self, AcceptedMedia};
use crate::error::{ClipiaError, ClipiaResult};
use crate::output::{ClipVerifier, VerificationResult};
use crate::planner::{CutPlan, KeyframeIndex, StrategyPlanner};
use crate::ports::{ExecutePort, ProbePort};
use crate::store::AssetStore;
use crate::utils::path::derived_name;

pub mod clipper;

pub use clipper::VideoClipper;

/// Clipping engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Parent of the per-job scratch directories
    pub scratch_dir: PathBuf,
    pub timeout: Duration,
    pub max_concurrent: usize,
    pub default_policy: TrimPolicy,
    pub min_copy_duration: f64,
    pub split_clip_seconds: f64,
    pub split_overlap_seconds: f64,
}

impl From<&Settings> for EngineConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            scratch_dir: settings.storage.scratch_dir(),
            timeout: settings.trim.timeout(),
            max_concurrent: settings.trim.max_concurrent,
            default_policy: settings.trim.default_policy,
            min_copy_duration: settings.trim.min_copy_seconds,
            split_clip_seconds: settings.trim.split_clip_seconds,
            split_overlap_seconds: settings.trim.split_overlap_seconds,
        }
    }
}

/// A finished trim
#[derive(Debug, Clone, Serialize)]
pub struct TrimOutcome {
    pub asset: Asset,
    pub plan: CutPlan,
    pub verification: VerificationResult,
}

struct EngineInner {
    store: AssetStore,
    probe: Arc<dyn ProbePort>,
    exec: Arc<dyn ExecutePort>,
    config: EngineConfig,
    planner: StrategyPlanner,
    permits: Arc<Semaphore>,
}

/// Trim engine handle. Cheap to clone.
#[derive(Clone)]
pub struct TrimEngine {
    inner: Arc<EngineInner>,
}

impl TrimEngine {
    pub async fn new(
        store: AssetStore,
        probe: Arc<dyn ProbePort>,
        exec: Arc<dyn ExecutePort>,
        config: EngineConfig,
    ) -> ClipiaResult<Self> {
        tokio::fs::create_dir_all(&config.scratch_dir).await?;
        let permits = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        let planner = StrategyPlanner::new(config.min_copy_duration);
        Ok(Self {
            inner: Arc::new(EngineInner {
                store,
                probe,
                exec,
                config,
                planner,
                permits,
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &AssetStore {
        &self.inner.store
    }

    /// Trim `request.source` to `[start, end]`, registering the result as a derived asset
    pub async fn trim(&self, request: TrimRequest) -> ClipiaResult<TrimOutcome> {
        let engine = self.clone();
        let handle = tokio::spawn(async move {
            let (source, source_path) = engine.video_source(&request.source).await?;
            let policy = request.policy.unwrap_or(engine.inner.config.default_policy);
            engine
                .run_job(
                    &source,
                    &source_path,
                    request.start.seconds,
                    request.end.seconds,
                    policy,
                    "trimmed",
                )
                .await
        });
        handle
            .await
            .map_err(|e| ClipiaError::processing(format!("trim task failed: {}", e)))?
    }

    /// Cut a video into overlapping windows, each stored as a derived asset
    pub async fn split(
        &self,
        source: &AssetId,
        clip_seconds: Option<f64>,
        overlap_seconds: Option<f64>,
    ) -> ClipiaResult<Vec<TrimOutcome>> {
        let engine = self.clone();
        let source = source.clone();
        let handle = tokio::spawn(async move {
            let (asset, path) = engine.video_source(&source).await?;
            let info = engine.probe_video(&path).await?;
            let clip = clip_seconds.unwrap_or(engine.inner.config.split_clip_seconds);
            let overlap = overlap_seconds.unwrap_or(engine.inner.config.split_overlap_seconds);
            let windows = rules::split_windows(info.duration, clip, overlap)?;
            info!(
                asset_id = %asset.id,
                "Splitting {:.1}s video into {} clips",
                info.duration,
                windows.len()
            );

            let policy = engine.inner.config.default_policy;
            let mut outcomes = Vec::with_capacity(windows.len());
            for (n, (start, end)) in windows.into_iter().enumerate() {
                let suffix = format!("part{}", n + 1);
                outcomes.push(
                    engine
                        .run_job(&asset, &path, start, end, policy, &suffix)
                        .await?,
                );
            }
            Ok(outcomes)
        });
        handle
            .await
            .map_err(|e| ClipiaError::processing(format!("split task failed: {}", e)))?
    }

    /// Probe a stored video
    pub async fn inspect(&self, id: &AssetId) -> ClipiaResult<(Asset, MediaInfo)> {
        let (asset, path) = self.video_source(id).await?;
        let info = self.probe_video(&path).await?;
        Ok((asset, info))
    }

    async fn video_source(&self, id: &AssetId) -> ClipiaResult<(Asset, PathBuf)> {
        let (asset, path) = self.inner.store.path_of(id).await?;
        if asset.kind != AssetKind::Video {
            return Err(ClipiaError::validation(format!(
                "Asset {} is not a video",
                asset.id
            )));
        }
        Ok((asset, path))
    }

    async fn probe_video(&self, path: &Path) -> ClipiaResult<MediaInfo> {
        let info = self.inner.probe.probe_media(path).await?;
        if info.video.is_none() {
            return Err(ClipiaError::UnsupportedFormat(
                "Source has no video stream".to_string(),
            ));
        }
        Ok(info)
    }

    /// One bounded job: produce the clip under the time budget, then register it
    #[instrument(skip(self, source, source_path), fields(asset_id = %source.id))]
    async fn run_job(
        &self,
        source: &Asset,
        source_path: &Path,
        start: f64,
        end: f64,
        policy: TrimPolicy,
        suffix: &str,
    ) -> ClipiaResult<TrimOutcome> {
        let _permit = self
            .inner
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ClipiaError::processing("trim engine is shutting down"))?;

        // removed on drop, including when the budget runs out mid-job
        let scratch = tempfile::Builder::new()
            .prefix("trim-")
            .tempdir_in(&self.inner.config.scratch_dir)?;

        let budget = self.inner.config.timeout;
        let produced = tokio::time::timeout(
            budget,
            self.produce(source, source_path, start, end, policy, scratch.path()),
        )
        .await;

        let (output, extension, plan, verification) = match produced {
            Ok(result) => result?,
            Err(_) => {
                warn!("Trim exceeded its {}s budget", budget.as_secs());
                return Err(ClipiaError::Timeout(budget));
            }
        };

        let content_type = AcceptedMedia::content_type_for(&extension)
            .map(str::to_string)
            .unwrap_or_else(|| source.content_type.clone());
        let asset = self
            .inner
            .store
            .ingest_file(
                &output,
                NewAsset {
                    kind: AssetKind::Video,
                    original_name: derived_name(&source.original_name, suffix, &extension),
                    content_type,
                    extension,
                    derived_from: Some(source.id.clone()),
                },
            )
            .await?;

        info!(
            derived_id = %asset.id,
            policy = %plan.policy,
            "Trim {:.3}s - {:.3}s registered",
            start,
            end
        );

        Ok(TrimOutcome {
            asset,
            plan,
            verification,
        })
    }

    async fn produce(
        &self,
        source: &Asset,
        source_path: &Path,
        start: f64,
        end: f64,
        policy: TrimPolicy,
        scratch: &Path,
    ) -> ClipiaResult<(PathBuf, String, CutPlan, VerificationResult)> {
        let info = self.probe_video(source_path).await?;
        rules::check_against_duration(start, end, info.duration)?;

        let keyframes = match (&info.video, policy) {
            (Some(video), TrimPolicy::Fast | TrimPolicy::Smart) if rules::copy_supported(&info) => {
                KeyframeIndex::new(
                    self.inner
                        .probe
                        .probe_keyframes(source_path, video.index)
                        .await?,
                )
            }
            _ => KeyframeIndex::default(),
        };

        let plan = self
            .inner
            .planner
            .plan(policy, &info, &keyframes, start, end);
        let extension = rules::output_extension(&source.extension, plan.reencodes());

        let output = VideoClipper::new(self.inner.exec.as_ref())
            .clip(source_path, &plan, scratch, &extension)
            .await?;
        let verification = ClipVerifier::new(self.inner.probe.as_ref())
            .verify(&output, &plan)
            .await?;

        Ok((output, extension, plan, verification))
    }
}
