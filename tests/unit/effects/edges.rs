use super::*;
use crate::effects::spec::{EffectKind, EffectSpec};
use crate::foundation::core::FrameIndex;
use crate::foundation::frame::PixelFormat;

fn vertical_step(w: u32, h: u32) -> Vec<u8> {
    (0..h)
        .flat_map(|_| (0..w).map(move |x| if x < w / 2 { 0u8 } else { 200u8 }))
        .collect()
}

#[test]
fn flat_image_has_no_edges() {
    let out = canny(&vec![90u8; 64], 8, 8, 50.0, 150.0);
    assert!(out.iter().all(|&v| v == 0));
}

#[test]
fn step_edge_is_thin_and_vertical() {
    let (w, h) = (12u32, 6u32);
    let out = canny(&vertical_step(w, h), w, h, 50.0, 150.0);
    assert!(out.iter().all(|&v| v == 0 || v == 255));
    for y in 0..h as usize {
        let row = &out[y * w as usize..(y + 1) * w as usize];
        let cols: Vec<_> = row
            .iter()
            .enumerate()
            .filter(|(_, v)| **v == 255)
            .map(|(x, _)| x)
            .collect();
        assert_eq!(cols.len(), 1, "row {y}: {cols:?}");
        assert!(cols[0] == 5 || cols[0] == 6);
    }
}

#[test]
fn high_threshold_above_gradient_suppresses_all() {
    let (w, h) = (12u32, 6u32);
    // Peak L1 Sobel magnitude of a 200-level step is 800.
    let out = canny(&vertical_step(w, h), w, h, 900.0, 900.0);
    assert!(out.iter().all(|&v| v == 0));
}

#[test]
fn edge_detect_rejects_inverted_thresholds() {
    let f = Frame::filled(FrameIndex(0), 4, 4, PixelFormat::Rgb8, &[1, 2, 3]).unwrap();
    let spec = EffectSpec::new(EffectKind::EdgeDetect)
        .with("low", 200)
        .with("high", 100);
    assert!(EdgeDetect.apply(&f, &spec.params()).is_err());
}

#[test]
fn edge_detect_output_is_binary_in_every_channel() {
    let (w, h) = (12u32, 6u32);
    let data = vertical_step(w, h).into_iter().flat_map(|v| [v, v, v, 128]).collect();
    let f = Frame::new(FrameIndex(0), w, h, PixelFormat::Rgba8, data).unwrap();
    let spec = EffectSpec::new(EffectKind::EdgeDetect);
    let out = EdgeDetect.apply(&f, &spec.params()).unwrap();
    for px in out.data().chunks_exact(4) {
        assert!(px[0] == 0 || px[0] == 255);
        assert_eq!(px[0], px[1]);
        assert_eq!(px[1], px[2]);
        assert_eq!(px[3], 128);
    }
}
