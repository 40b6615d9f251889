use super::*;
use crate::foundation::frame::PixelFormat;

fn textured(index: u64, dx: f64) -> Frame {
    let (w, h) = (96u32, 96u32);
    let mut out = Vec::with_capacity((w * h) as usize);
    for y in 0..h {
        for x in 0..w {
            let (xf, yf) = (f64::from(x) + dx, f64::from(y));
            let v = 128.0
                + 60.0 * (0.35 * xf).sin() * (0.3 * yf).cos()
                + 40.0 * (0.13 * xf + 0.21 * yf).sin();
            out.push(v.round().clamp(0.0, 255.0) as u8);
        }
    }
    Frame::new(FrameIndex(index), w, h, PixelFormat::Gray8, out).unwrap()
}

#[test]
fn first_update_detects_and_later_updates_track() {
    let mut t = PointTracker::new(TrackerParams::default()).unwrap();
    let first = t.update(&textured(0, 0.0));
    assert!(first.detected > 0);
    assert_eq!(first.tracked, 0);
    let start: Vec<TrackPoint> = t
        .points()
        .iter()
        .copied()
        .filter(|p| (24.0..=72.0).contains(&p.position.x) && (24.0..=72.0).contains(&p.position.y))
        .collect();
    assert!(!start.is_empty());

    for k in 1..=3u64 {
        t.update(&textured(k, k as f64));
    }
    let mut followed = 0;
    for p in t.points() {
        if let Some(s) = start.iter().find(|s| s.id == p.id) {
            assert!((p.position.x - (s.position.x - 3.0)).abs() < 0.3, "{p:?} from {s:?}");
            assert!((p.position.y - s.position.y).abs() < 0.3);
            followed += 1;
        }
    }
    assert!(followed > 0);
}

#[test]
fn ids_are_unique_and_never_reused() {
    let mut t = PointTracker::new(TrackerParams::default()).unwrap();
    t.update(&textured(0, 0.0));
    let max_before = t.points().iter().map(|p| p.id).max().unwrap();
    let mut ids: Vec<u64> = t.points().iter().map(|p| p.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), t.points().len());

    t.clear();
    assert!(t.points().is_empty());
    let manual = t.add_point(Point::new(48.0, 48.0));
    assert!(manual > max_before);
}

#[test]
fn lost_points_are_retired() {
    let mut t = PointTracker::new(TrackerParams::default()).unwrap();
    let flat = Frame::filled(FrameIndex(0), 96, 96, PixelFormat::Gray8, &[60]).unwrap();
    t.update(&flat);
    assert!(t.points().is_empty());
    t.add_point(Point::new(40.0, 40.0));
    let stats = t.update(&flat.with_index(FrameIndex(1)));
    assert_eq!(stats.retired, 1);
    assert!(t.points().is_empty());
}

#[test]
fn csv_has_header_and_reads_back() {
    let mut log = TrackLog::new();
    log.record(
        FrameIndex(2),
        &[TrackPoint {
            id: 7,
            position: Point::new(1.5, -2.25),
            confidence: 0.75,
        }],
    );
    log.record(FrameIndex(3), &[]);
    let mut buf = Vec::new();
    log.write_csv(&mut buf).unwrap();
    let text = String::from_utf8(buf.clone()).unwrap();
    assert_eq!(text.lines().next(), Some("frame,point_id,x,y,confidence"));
    assert_eq!(text.lines().nth(1), Some("2,7,1.5,-2.25,0.75"));

    let back = TrackLog::read_csv(buf.as_slice()).unwrap();
    assert_eq!(back, log);
}

#[test]
fn malformed_csv_is_a_serde_error() {
    let err = TrackLog::read_csv("frame,point_id,x,y,confidence\nx,1,2,3,4\n".as_bytes()).unwrap_err();
    assert!(matches!(err, FramelabError::Serde(_)));
}

#[test]
fn json_export_is_an_array_of_records() {
    let mut log = TrackLog::new();
    log.record(
        FrameIndex(0),
        &[TrackPoint {
            id: 1,
            position: Point::new(3.0, 4.0),
            confidence: 1.0,
        }],
    );
    let v: serde_json::Value = serde_json::from_str(&log.to_json().unwrap()).unwrap();
    assert_eq!(v[0]["point_id"], 1);
    assert_eq!(v[0]["x"], 3.0);
}
