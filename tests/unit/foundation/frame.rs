use super::*;

#[test]
fn new_rejects_mismatched_buffer() {
    assert!(Frame::new(FrameIndex(0), 2, 2, PixelFormat::Rgb8, vec![0; 11]).is_err());
    assert!(Frame::new(FrameIndex(0), 0, 2, PixelFormat::Gray8, vec![]).is_err());
    assert!(Frame::new(FrameIndex(0), 2, 2, PixelFormat::Rgba8, vec![0; 16]).is_ok());
}

#[test]
fn with_index_shares_pixels() {
    let f = Frame::filled(FrameIndex(1), 3, 2, PixelFormat::Rgb8, &[1, 2, 3]).unwrap();
    let g = f.with_index(FrameIndex(9));
    assert_eq!(g.index(), FrameIndex(9));
    assert_eq!(g.data(), f.data());
    assert_eq!(g.pixel(2, 1), &[1, 2, 3]);
}

#[test]
fn mean_intensity_ignores_alpha() {
    let f = Frame::filled(FrameIndex(0), 4, 4, PixelFormat::Rgba8, &[10, 20, 30, 255]).unwrap();
    assert!((f.mean_intensity() - 20.0).abs() < 1e-9);
}

#[test]
fn luma_of_gray_rgb_is_identity() {
    let f = Frame::filled(FrameIndex(0), 2, 1, PixelFormat::Rgb8, &[77, 77, 77]).unwrap();
    assert_eq!(f.luma(), vec![77, 77]);
}

#[test]
fn to_rgba8_expands_gray() {
    let f = Frame::new(FrameIndex(0), 2, 1, PixelFormat::Gray8, vec![5, 6]).unwrap();
    assert_eq!(f.to_rgba8(), vec![5, 5, 5, 255, 6, 6, 6, 255]);
}

#[test]
fn downscale_half_averages_blocks() {
    let data = vec![0, 100, 10, 10, 200, 50, 10, 10];
    let f = Frame::new(FrameIndex(3), 4, 2, PixelFormat::Gray8, data).unwrap();
    let small = f.downscale(0.5).unwrap();
    assert_eq!((small.width(), small.height()), (2, 1));
    assert_eq!(small.data(), &[88, 10]);
    assert_eq!(small.index(), FrameIndex(3));
    assert!(f.downscale(0.0).is_err());
    assert_eq!(f.downscale(1.0).unwrap(), f);
}
