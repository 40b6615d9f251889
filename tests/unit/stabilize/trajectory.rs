use super::*;
use crate::motion::MotionModel;

fn step(from: u64, tx: f64, reliable: bool) -> MotionSample {
    MotionSample {
        from: FrameIndex(from),
        to: FrameIndex(from + 1),
        transform: Mat3::translation(tx, 0.0),
        model: MotionModel::Translation,
        inlier_ratio: 1.0,
        reliable,
    }
}

fn tx_of(m: &Mat3) -> f64 {
    m.translation_part().0
}

#[test]
fn starts_at_identity() {
    let t = Trajectory::new(FrameIndex(5));
    assert_eq!(t.len(), 1);
    assert!(t.poses()[0].is_identity());
    assert_eq!(t.range(), FrameRange::new(FrameIndex(5), FrameIndex(6)).unwrap());
}

#[test]
fn push_accumulates_poses() {
    let mut t = Trajectory::new(FrameIndex(0));
    t.push(&step(0, -2.0, true)).unwrap();
    t.push(&step(1, -2.0, false)).unwrap();
    assert_eq!(t.len(), 3);
    assert_eq!(tx_of(t.pose(FrameIndex(2)).unwrap()), -4.0);
    assert_eq!(t.unreliable_count(), 1);
    assert!(t.pose(FrameIndex(3)).is_none());
}

#[test]
fn push_rejects_gaps() {
    let mut t = Trajectory::new(FrameIndex(0));
    assert!(t.push(&step(1, 1.0, true)).is_err());
    assert_eq!(t.len(), 1);
}

#[test]
fn smoothing_window_is_truncated_at_the_ends() {
    let mut t = Trajectory::new(FrameIndex(0));
    for k in 0..3 {
        t.push(&step(k, -2.0, true)).unwrap();
    }
    let r0: Vec<f64> = t.smooth(0).iter().map(tx_of).collect();
    assert_eq!(r0, vec![0.0, -2.0, -4.0, -6.0]);
    let r1: Vec<f64> = t.smooth(1).iter().map(tx_of).collect();
    assert_eq!(r1, vec![-1.0, -2.0, -4.0, -5.0]);
    let all: Vec<f64> = t.smooth(100).iter().map(tx_of).collect();
    assert_eq!(all, vec![-3.0; 4]);
}
