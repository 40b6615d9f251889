use super::*;
use crate::foundation::frame::PixelFormat;

fn textured(index: u64, w: u32, h: u32, dx: f64, dy: f64) -> Frame {
    let mut out = Vec::with_capacity((w * h) as usize);
    for y in 0..h {
        for x in 0..w {
            let (xf, yf) = (f64::from(x) + dx, f64::from(y) + dy);
            let v = 128.0
                + 60.0 * (0.35 * xf).sin() * (0.3 * yf).cos()
                + 40.0 * (0.13 * xf + 0.21 * yf).sin();
            out.push(v.round().clamp(0.0, 255.0) as u8);
        }
    }
    Frame::new(FrameIndex(index), w, h, PixelFormat::Gray8, out).unwrap()
}

fn estimator(strategy: Strategy, model: MotionModel) -> MotionEstimator {
    MotionEstimator::new(EstimatorParams {
        strategy,
        model,
        ..EstimatorParams::default()
    })
    .unwrap()
}

#[test]
fn sparse_translation_recovers_shift() {
    let est = estimator(Strategy::Sparse, MotionModel::Translation);
    let s = est.estimate(&textured(0, 96, 96, 0.0, 0.0), &textured(1, 96, 96, 2.0, 0.0));
    assert!(s.reliable);
    assert_eq!((s.from, s.to), (FrameIndex(0), FrameIndex(1)));
    let (tx, ty) = s.transform.translation_part();
    assert!((tx + 2.0).abs() < 0.25, "tx = {tx}");
    assert!(ty.abs() < 0.25, "ty = {ty}");
    assert!(s.inlier_ratio >= 0.25);
}

#[test]
fn dense_translation_recovers_shift() {
    let est = estimator(Strategy::Dense, MotionModel::Translation);
    let s = est.estimate(&textured(4, 128, 96, 0.0, 0.0), &textured(5, 128, 96, 0.0, 2.0));
    assert!(s.reliable);
    let (tx, ty) = s.transform.translation_part();
    assert!(tx.abs() < 0.25, "tx = {tx}");
    assert!((ty + 2.0).abs() < 0.25, "ty = {ty}");
}

#[test]
fn sparse_affine_on_pure_shift_is_near_translation() {
    let est = estimator(Strategy::Sparse, MotionModel::Affine);
    let s = est.estimate(&textured(0, 96, 96, 0.0, 0.0), &textured(1, 96, 96, 2.0, 0.0));
    assert!(s.reliable);
    assert_eq!(s.model, MotionModel::Affine);
    assert!(s.transform.max_abs_diff(&Mat3::translation(-2.0, 0.0)) < 0.25);
}

#[test]
fn flat_frames_fall_back_to_identity() {
    let est = estimator(Strategy::Sparse, MotionModel::Translation);
    let a = Frame::filled(FrameIndex(0), 64, 64, PixelFormat::Gray8, &[50]).unwrap();
    let b = a.with_index(FrameIndex(1));
    let s = est.estimate(&a, &b);
    assert!(!s.reliable);
    assert!(s.transform.is_identity());
}

#[test]
fn size_change_falls_back_to_identity() {
    let est = estimator(Strategy::Sparse, MotionModel::Translation);
    let s = est.estimate(&textured(0, 96, 96, 0.0, 0.0), &textured(1, 80, 96, 0.0, 0.0));
    assert!(!s.reliable);
    assert!(s.transform.is_identity());
}

#[test]
fn missing_pair_is_identity() {
    let est = estimator(Strategy::Dense, MotionModel::Homography);
    let s = est.estimate_missing(FrameIndex(3), FrameIndex(4));
    assert_eq!(s, MotionSample::identity(FrameIndex(3), FrameIndex(4), MotionModel::Homography));
}

#[test]
fn estimation_is_deterministic() {
    let est = estimator(Strategy::Sparse, MotionModel::Homography);
    let a = textured(0, 96, 96, 0.0, 0.0);
    let b = textured(1, 96, 96, 1.5, -1.0);
    assert_eq!(est.estimate(&a, &b), est.estimate(&a, &b));
}

#[test]
fn prepared_frames_match_direct_estimate() {
    let est = estimator(Strategy::Sparse, MotionModel::Translation);
    let a = textured(0, 96, 96, 0.0, 0.0);
    let b = textured(1, 96, 96, 1.0, 1.0);
    let (pa, pb) = (est.prepare(&a), est.prepare(&b));
    assert_eq!(pa.index(), FrameIndex(0));
    assert_eq!(est.estimate_prepared(&pa, &pb), est.estimate(&a, &b));
}

#[test]
fn invalid_params_are_rejected() {
    let mut p = EstimatorParams::default();
    p.ransac.iterations = 0;
    assert!(MotionEstimator::new(p).is_err());
}

#[test]
fn params_deserialize_with_defaults() {
    let p: EstimatorParams =
        serde_json::from_str(r#"{"strategy":"dense","model":"affine"}"#).unwrap();
    assert_eq!(p.strategy, Strategy::Dense);
    assert_eq!(p.model, MotionModel::Affine);
    assert_eq!(p.ransac, RansacParams::default());
}
