use super::*;
use crate::foundation::frame::PixelFormat;
use crate::motion::{MotionModel, MotionSample};

fn trajectory(steps: &[f64]) -> Trajectory {
    let mut t = Trajectory::new(FrameIndex(0));
    for (k, tx) in steps.iter().enumerate() {
        t.push(&MotionSample {
            from: FrameIndex(k as u64),
            to: FrameIndex(k as u64 + 1),
            transform: Mat3::translation(*tx, 0.0),
            model: MotionModel::Translation,
            inlier_ratio: 1.0,
            reliable: true,
        })
        .unwrap();
    }
    t
}

fn params(strength: f64, radius: u32, border: BorderPolicy) -> StabilizationParams {
    StabilizationParams {
        enabled: true,
        strength,
        smoothing_radius: radius,
        border,
        ..StabilizationParams::default()
    }
}

fn numbered(index: u64, w: u32, h: u32) -> Frame {
    let data = (0..w * h).map(|i| (i % 251) as u8).collect();
    Frame::new(FrameIndex(index), w, h, PixelFormat::Gray8, data).unwrap()
}

#[test]
fn zero_strength_is_exact_passthrough() {
    let t = trajectory(&[3.0, -1.0, 2.5]);
    let plan = StabilizationPlan::build(&t, &params(0.0, 1, BorderPolicy::Crop), 31, 17).unwrap();
    assert!(plan.corrections().iter().all(Mat3::is_identity));
    assert_eq!(plan.crop(), None);
    assert_eq!(plan.output_size(), (31, 17));
    let f = numbered(2, 31, 17);
    assert_eq!(plan.apply(&f, Vec2::ZERO).unwrap(), f);
}

#[test]
fn full_window_removes_drift() {
    let t = trajectory(&[-2.0; 99]);
    let plan =
        StabilizationPlan::build(&t, &params(100.0, 100, BorderPolicy::Replicate), 64, 48).unwrap();
    assert_eq!(plan.corrections().len(), 100);
    let (c0, _) = plan.corrections()[0].translation_part();
    let (c99, _) = plan.corrections()[99].translation_part();
    assert!((c0 + 99.0).abs() < 1e-9);
    assert!((c99 - 99.0).abs() < 1e-9);
    let res = plan.residual_trajectory();
    let (first, _) = res[0].translation_part();
    let (last, _) = res[99].translation_part();
    assert!((last - first).abs() < 1e-6);
}

#[test]
fn crop_is_the_common_valid_rectangle() {
    let t = trajectory(&[4.0, -4.0]);
    let plan = StabilizationPlan::build(&t, &params(100.0, 1, BorderPolicy::Crop), 32, 32).unwrap();
    assert_eq!(
        plan.crop(),
        Some(CropRect {
            x: 2,
            y: 0,
            width: 26,
            height: 32
        })
    );
    assert_eq!(plan.output_size(), (26, 32));
    assert_eq!(plan.output_size_for(20, 32, Vec2::new(4.0, 0.0)), (20, 32));

    let f = numbered(0, 32, 32);
    let out = plan.apply(&f, Vec2::ZERO).unwrap();
    assert_eq!((out.width(), out.height()), (26, 32));
    assert_eq!(out.pixel(0, 0), f.pixel(0, 0));
    assert_eq!(out.pixel(25, 31), f.pixel(25, 31));
}

#[test]
fn crop_without_common_area_falls_back_to_replicate() {
    let t = trajectory(&[-2.0; 99]);
    let plan = StabilizationPlan::build(&t, &params(100.0, 100, BorderPolicy::Crop), 32, 32).unwrap();
    assert_eq!(plan.crop(), None);
    assert_eq!(plan.border(), BorderPolicy::Replicate);
    assert_eq!(plan.diagnostics().len(), 1);
    assert_eq!(plan.output_size(), (32, 32));
}

#[test]
fn frames_outside_the_range_are_rejected() {
    let t = trajectory(&[1.0]);
    let plan =
        StabilizationPlan::build(&t, &params(100.0, 1, BorderPolicy::Replicate), 8, 8).unwrap();
    assert!(plan.apply(&numbered(7, 8, 8), Vec2::ZERO).is_err());
}

#[test]
fn fingerprint_covers_range_and_parameters() {
    let p = params(100.0, 2, BorderPolicy::Replicate);
    let a = StabilizationPlan::build(&trajectory(&[1.0, 1.0]), &p, 8, 8).unwrap();
    let b = StabilizationPlan::build(&trajectory(&[1.0, 1.0, 1.0]), &p, 8, 8).unwrap();
    let c = StabilizationPlan::build(&trajectory(&[1.0, 1.0]), &params(50.0, 2, BorderPolicy::Replicate), 8, 8)
        .unwrap();
    assert_ne!(a.fingerprint(), b.fingerprint());
    assert_ne!(a.fingerprint(), c.fingerprint());
    assert_eq!(
        a.fingerprint(),
        StabilizationPlan::build(&trajectory(&[1.0, 1.0]), &p, 8, 8)
            .unwrap()
            .fingerprint()
    );
}
