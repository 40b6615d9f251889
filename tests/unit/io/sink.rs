use super::*;

fn cfg() -> SinkConfig {
    SinkConfig {
        width: 2,
        height: 2,
        fps: Fps::new(30, 1).unwrap(),
        format: PixelFormat::Gray8,
    }
}

fn frame(index: u64) -> Frame {
    Frame::filled(FrameIndex(index), 2, 2, PixelFormat::Gray8, &[index as u8]).unwrap()
}

#[test]
fn clones_observe_the_same_frames() {
    let observer = InMemorySink::new();
    let mut sink = observer.clone();
    sink.begin(cfg()).unwrap();
    sink.push_frame(FrameIndex(3), &frame(3)).unwrap();
    sink.push_frame(FrameIndex(5), &frame(5)).unwrap();
    assert!(!observer.is_finished());
    sink.end().unwrap();

    assert_eq!(observer.config(), Some(cfg()));
    assert_eq!(observer.indices(), vec![FrameIndex(3), FrameIndex(5)]);
    assert_eq!(observer.frames()[1].data()[0], 5);
    assert!(observer.is_finished());
}

#[test]
fn rejects_out_of_order_and_unstarted_pushes() {
    let mut sink = InMemorySink::new();
    assert!(sink.push_frame(FrameIndex(0), &frame(0)).is_err());
    sink.begin(cfg()).unwrap();
    sink.push_frame(FrameIndex(2), &frame(2)).unwrap();
    assert!(sink.push_frame(FrameIndex(2), &frame(2)).is_err());
    assert!(sink.push_frame(FrameIndex(1), &frame(1)).is_err());
    assert_eq!(sink.indices(), vec![FrameIndex(2)]);
}

#[test]
fn begin_resets_previous_capture() {
    let mut sink = InMemorySink::new();
    sink.begin(cfg()).unwrap();
    sink.push_frame(FrameIndex(0), &frame(0)).unwrap();
    sink.end().unwrap();
    sink.begin(cfg()).unwrap();
    assert!(sink.frames().is_empty());
    assert!(!sink.is_finished());
}

#[test]
fn ensure_parent_dir_creates_missing_directories() {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let root = std::env::temp_dir().join(format!("framelab_sink_{}_{nanos}", std::process::id()));
    let file = root.join("a").join("b").join("out.mp4");
    ensure_parent_dir(&file).unwrap();
    assert!(root.join("a").join("b").is_dir());
    ensure_parent_dir(std::path::Path::new("bare.mp4")).unwrap();
    let _ = std::fs::remove_dir_all(&root);
}
