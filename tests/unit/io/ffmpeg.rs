use super::*;

#[test]
fn flatten_alpha_0_returns_bg() {
    let src = vec![0u8, 0, 0, 0];
    let mut dst = vec![0u8; 4];
    flatten_over_bg(&mut dst, &src, [10, 20, 30, 255]).unwrap();
    assert_eq!(dst, vec![10, 20, 30, 255]);
}

#[test]
fn flatten_alpha_255_is_identity() {
    let src = vec![1u8, 2, 3, 255];
    let mut dst = vec![0u8; 4];
    flatten_over_bg(&mut dst, &src, [10, 20, 30, 255]).unwrap();
    assert_eq!(dst, src);
}

#[test]
fn flatten_rejects_mismatched_buffers() {
    let mut dst = vec![0u8; 8];
    assert!(flatten_over_bg(&mut dst, &[0u8; 4], [0, 0, 0, 255]).is_err());
}

#[test]
fn rational_frame_rates_parse() {
    assert_eq!(parse_rational("30000/1001"), Some(Fps { num: 30000, den: 1001 }));
    assert_eq!(parse_rational("25"), Some(Fps { num: 25, den: 1 }));
    assert_eq!(parse_rational("0/0"), None);
    assert_eq!(parse_rational("abc"), None);
}

#[test]
fn pixel_formats_map_to_rawvideo_names() {
    assert_eq!(raw_pix_fmt(PixelFormat::Gray8), "gray");
    assert_eq!(raw_pix_fmt(PixelFormat::Rgb8), "rgb24");
    assert_eq!(raw_pix_fmt(PixelFormat::Rgba8), "rgba");
}

#[test]
fn odd_dimensions_are_rejected_before_spawning() {
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(std::env::temp_dir().join("framelab_never.mp4")));
    let err = sink
        .begin(SinkConfig {
            width: 15,
            height: 8,
            fps: Fps::new(30, 1).unwrap(),
            format: PixelFormat::Rgb8,
        })
        .unwrap_err();
    assert!(matches!(err, FramelabError::Validation(_)));
}

#[test]
fn push_before_begin_fails() {
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new("unused.mp4"));
    let f = Frame::filled(FrameIndex(0), 2, 2, PixelFormat::Rgb8, &[0, 0, 0]).unwrap();
    assert!(sink.push_frame(FrameIndex(0), &f).is_err());
}

#[cfg(not(feature = "media-ffmpeg"))]
#[test]
fn source_requires_the_media_feature() {
    assert!(matches!(
        FfmpegSource::open("clip.mp4"),
        Err(FramelabError::Decode(_))
    ));
}
