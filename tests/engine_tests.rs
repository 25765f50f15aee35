//! Trim engine tests against fake probe and execute ports

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use clipia::domain::model::{AssetId, AssetKind, TimeSpec, TrimPolicy, TrimRequest};
use clipia::error::{ClipiaError, ErrorKind, RangeViolation};

use common::{harness, harness_with, Behavior, Harness};

async fn upload_source(h: &Harness) -> AssetId {
    h.store
        .put(b"source video bytes", AssetKind::Video, "match.mp4", Some("video/mp4"))
        .await
        .unwrap()
        .id
}

fn request(source: &AssetId, start: f64, end: f64) -> TrimRequest {
    TrimRequest::new(
        source.clone(),
        TimeSpec::from_seconds(start),
        TimeSpec::from_seconds(end),
    )
    .unwrap()
}

#[tokio::test]
async fn test_trim_registers_derived_asset() {
    let h = harness(Behavior::Succeed).await;
    let source = upload_source(&h).await;

    let outcome = h.engine.trim(request(&source, 2.0, 5.0)).await.unwrap();

    assert_ne!(outcome.asset.id, source);
    assert_eq!(outcome.asset.derived_from.as_ref(), Some(&source));
    assert_eq!(outcome.asset.kind, AssetKind::Video);
    assert_eq!(outcome.asset.original_name, "match_trimmed.mp4");
    assert!(outcome.verification.passed);
    assert!((outcome.verification.actual_duration - 3.0).abs() < 1e-6);

    // source untouched, new asset readable
    let (_, original) = h.store.read_all(&source).await.unwrap();
    assert_eq!(original, b"source video bytes");
    let (_, clip) = h.store.read_all(&outcome.asset.id).await.unwrap();
    assert_eq!(clip, b"clip 2 5");
    assert_eq!(h.store.count().await.unwrap(), 2);
    assert_eq!(h.scratch_entries(), 0);
}

#[tokio::test]
async fn test_exact_policy_is_single_reencode() {
    let h = harness(Behavior::Succeed).await;
    let source = upload_source(&h).await;

    let outcome = h
        .engine
        .trim(request(&source, 1.25, 3.5).with_policy(TrimPolicy::Exact))
        .await
        .unwrap();

    assert_eq!(outcome.plan.policy, TrimPolicy::Exact);
    assert_eq!(outcome.plan.segments.len(), 1);
    assert!(outcome.plan.reencodes());
    assert_eq!(h.exec.concats.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_smart_policy_splits_unaligned_cuts() {
    let h = harness(Behavior::Succeed).await;
    let source = upload_source(&h).await;

    // keyframes every 2s: 1.5 and 8.5 are both off-keyframe
    let outcome = h.engine.trim(request(&source, 1.5, 8.5)).await.unwrap();

    assert_eq!(outcome.plan.segments.len(), 3);
    assert_eq!(h.exec.cuts.load(Ordering::SeqCst), 3);
    assert_eq!(h.exec.concats.load(Ordering::SeqCst), 1);
    assert!((outcome.verification.actual_duration - 7.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_reversed_range_is_rejected_before_any_work() {
    let h = harness(Behavior::Succeed).await;
    let source = upload_source(&h).await;

    let err = TrimRequest::new(
        source,
        TimeSpec::from_seconds(6.0),
        TimeSpec::from_seconds(4.0),
    )
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(h.store.count().await.unwrap(), 1);
    assert_eq!(h.exec.cuts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_end_beyond_duration_is_rejected() {
    let h = harness(Behavior::Succeed).await;
    let source = upload_source(&h).await;

    let err = h.engine.trim(request(&source, 2.0, 12.0)).await.unwrap_err();

    assert!(matches!(
        err,
        ClipiaError::InvalidRange(RangeViolation::EndBeyondDuration { .. })
    ));
    assert_eq!(h.store.count().await.unwrap(), 1);
    assert_eq!(h.exec.cuts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_source_is_not_found() {
    let h = harness(Behavior::Succeed).await;

    let err = h
        .engine
        .trim(request(&AssetId::generate(), 0.0, 1.0))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_image_source_is_rejected() {
    let h = harness(Behavior::Succeed).await;
    let image = h
        .store
        .put(b"png bytes", AssetKind::Image, "thumb.png", Some("image/png"))
        .await
        .unwrap();

    let err = h.engine.trim(request(&image.id, 0.0, 1.0)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_unparseable_source_is_unsupported() {
    let h = harness(Behavior::Succeed).await;
    let source = h
        .store
        .put(b"not media at all", AssetKind::Video, "broken.mp4", Some("video/mp4"))
        .await
        .unwrap();

    let err = h.engine.trim(request(&source.id, 0.0, 1.0)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    assert_eq!(h.store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_executor_failure_is_processing_error() {
    let h = harness(Behavior::Fail).await;
    let source = upload_source(&h).await;

    let err = h.engine.trim(request(&source, 2.0, 5.0)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Processing);
    assert_eq!(err.client_message(), "Video processing failed.");
    assert_eq!(h.store.count().await.unwrap(), 1);
    assert_eq!(h.scratch_entries(), 0);
}

#[tokio::test]
async fn test_timeout_cleans_up_and_registers_nothing() {
    let h = harness_with(
        Behavior::Hang(Duration::from_secs(30)),
        Duration::from_millis(200),
        TrimPolicy::Exact,
    )
    .await;
    let source = upload_source(&h).await;

    let err = h.engine.trim(request(&source, 2.0, 5.0)).await.unwrap_err();

    assert!(matches!(err, ClipiaError::Timeout(_)));
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(h.store.count().await.unwrap(), 1);
    assert_eq!(h.scratch_entries(), 0);
}

#[tokio::test]
async fn test_concurrent_trims_produce_distinct_assets() {
    let h = harness(Behavior::Succeed).await;
    let source = upload_source(&h).await;

    let (a, b, c) = tokio::join!(
        h.engine.trim(request(&source, 0.0, 2.0)),
        h.engine.trim(request(&source, 2.0, 6.0)),
        h.engine.trim(request(&source, 4.0, 10.0)),
    );
    let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

    assert_ne!(a.asset.id, b.asset.id);
    assert_ne!(b.asset.id, c.asset.id);
    assert_ne!(a.asset.id, c.asset.id);
    assert_eq!(h.store.count().await.unwrap(), 4);

    let (_, bytes) = h.store.read_all(&b.asset.id).await.unwrap();
    assert_eq!(bytes, b"clip 2 6");
}

#[tokio::test]
async fn test_split_produces_overlapping_clips() {
    let h = harness(Behavior::Succeed).await;
    let source = upload_source(&h).await;

    let outcomes = h.engine.split(&source, None, None).await.unwrap();

    // 4s windows every 3s over 10s
    assert_eq!(outcomes.len(), 3);
    let (_, first) = h.store.read_all(&outcomes[0].asset.id).await.unwrap();
    assert_eq!(first, b"clip 0 4");
    let (_, last) = h.store.read_all(&outcomes[2].asset.id).await.unwrap();
    assert_eq!(last, b"clip 6 10");
    for (n, outcome) in outcomes.iter().enumerate() {
        assert_eq!(outcome.asset.derived_from.as_ref(), Some(&source));
        assert_eq!(
            outcome.asset.original_name,
            format!("match_part{}.mp4", n + 1)
        );
    }
    assert_eq!(h.store.count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_split_rejects_overlap_not_below_clip() {
    let h = harness(Behavior::Succeed).await;
    let source = upload_source(&h).await;

    let err = h
        .engine
        .split(&source, Some(3.0), Some(3.0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(h.store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_inspect_reports_probe() {
    let h = harness(Behavior::Succeed).await;
    let source = upload_source(&h).await;

    let (asset, info) = h.engine.inspect(&source).await.unwrap();
    assert_eq!(asset.id, source);
    assert_eq!(info.duration, common::SOURCE_DURATION);
}
