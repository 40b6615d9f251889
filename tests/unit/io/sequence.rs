use super::*;

fn temp_dir(name: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("framelab_{name}_{}_{nanos}", std::process::id()))
}

fn rgb(index: u64, seed: u8) -> Frame {
    let data = (0..4 * 3 * 3).map(|i| seed.wrapping_add(i as u8 * 7)).collect();
    Frame::new(FrameIndex(index), 4, 3, PixelFormat::Rgb8, data).unwrap()
}

fn cfg(format: PixelFormat) -> SinkConfig {
    SinkConfig {
        width: 4,
        height: 3,
        fps: Fps::new(30, 1).unwrap(),
        format,
    }
}

#[test]
fn file_names_are_zero_padded() {
    assert_eq!(sequence_file_name(0), "frame_000000.png");
    assert_eq!(sequence_file_name(1234), "frame_001234.png");
}

#[test]
fn written_sequence_reads_back() {
    let dir = temp_dir("seq_roundtrip");
    let mut sink = ImageSequenceSink::new(&dir);
    sink.begin(cfg(PixelFormat::Rgb8)).unwrap();
    sink.push_frame(FrameIndex(10), &rgb(10, 1)).unwrap();
    sink.push_frame(FrameIndex(11), &rgb(11, 50)).unwrap();
    sink.end().unwrap();
    assert_eq!(sink.written(), 2);
    assert!(dir.join("frame_000000.png").is_file());
    assert!(dir.join("frame_000001.png").is_file());

    let mut src = ImageSequenceSource::open(&dir).unwrap();
    let info = src.info();
    assert_eq!(info.frame_count, 2);
    assert_eq!((info.width, info.height, info.format), (4, 3, PixelFormat::Rgb8));
    let back = src.read(FrameIndex(1)).unwrap();
    assert_eq!(back.data(), rgb(1, 50).data());
    assert_eq!(back.index(), FrameIndex(1));
    assert_eq!(
        src.read(FrameIndex(2)),
        Err(DecodeError::EndOfStream(FrameIndex(2)))
    );
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn grayscale_images_open_as_gray8() {
    let dir = temp_dir("seq_gray");
    let mut sink = ImageSequenceSink::new(&dir);
    sink.begin(cfg(PixelFormat::Gray8)).unwrap();
    let f = Frame::new(FrameIndex(0), 4, 3, PixelFormat::Gray8, (0..12).collect()).unwrap();
    sink.push_frame(FrameIndex(0), &f).unwrap();
    sink.end().unwrap();

    let src = ImageSequenceSource::open(&dir)
        .unwrap()
        .with_fps(Fps::new(12, 1).unwrap());
    assert_eq!(src.info().format, PixelFormat::Gray8);
    assert_eq!(src.info().fps, Fps::new(12, 1).unwrap());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn sink_rejects_out_of_order_and_wrong_size() {
    let dir = temp_dir("seq_order");
    let mut sink = ImageSequenceSink::new(&dir);
    sink.begin(cfg(PixelFormat::Rgb8)).unwrap();
    sink.push_frame(FrameIndex(5), &rgb(5, 0)).unwrap();
    assert!(sink.push_frame(FrameIndex(4), &rgb(4, 0)).is_err());
    let small = Frame::filled(FrameIndex(6), 2, 2, PixelFormat::Rgb8, &[0, 0, 0]).unwrap();
    assert!(sink.push_frame(FrameIndex(6), &small).is_err());
    assert_eq!(sink.written(), 1);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn empty_directory_is_an_error() {
    let dir = temp_dir("seq_empty");
    std::fs::create_dir_all(&dir).unwrap();
    assert!(ImageSequenceSource::open(&dir).is_err());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn fingerprint_distinguishes_directories_and_file_changes() {
    let write = |dir: &PathBuf, seed: u8| {
        let mut sink = ImageSequenceSink::new(dir);
        sink.begin(cfg(PixelFormat::Rgb8)).unwrap();
        sink.push_frame(FrameIndex(0), &rgb(0, seed)).unwrap();
        sink.end().unwrap();
    };
    let a = temp_dir("seq_fp_a");
    let b = temp_dir("seq_fp_b");
    write(&a, 1);
    write(&b, 1);

    let first = ImageSequenceSource::open(&a).unwrap().fingerprint();
    assert_eq!(ImageSequenceSource::open(&a).unwrap().fingerprint(), first);
    assert_ne!(ImageSequenceSource::open(&b).unwrap().fingerprint(), first);

    // Replacing the file with a different image changes its length or modification time.
    std::thread::sleep(std::time::Duration::from_millis(20));
    let big = Frame::new(
        FrameIndex(0),
        4,
        3,
        PixelFormat::Rgb8,
        (0..36u32).map(|i| (i * 97 % 251) as u8).collect(),
    )
    .unwrap();
    save_png(&big, &a.join("frame_000000.png")).unwrap();
    assert_ne!(ImageSequenceSource::open(&a).unwrap().fingerprint(), first);

    let _ = std::fs::remove_dir_all(&a);
    let _ = std::fs::remove_dir_all(&b);
}
