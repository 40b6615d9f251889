use std::io::Cursor;

use super::*;
use crate::effects::spec::{EffectKind, EffectSpec};
use crate::foundation::core::FrameIndex;

fn temp_dir(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "framelab_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn write_png(path: &Path, w: u32, h: u32, px: [u8; 4]) {
    let img = RgbaImage::from_raw(w, h, px.repeat((w * h) as usize)).unwrap();
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    std::fs::write(path, &buf).unwrap();
}

#[test]
fn overlay_blends_with_opacity() {
    let tmp = temp_dir("overlay_blend");
    std::fs::create_dir_all(&tmp).unwrap();
    let png = tmp.join("logo.png");
    write_png(&png, 2, 2, [200, 100, 0, 255]);

    let f = Frame::filled(FrameIndex(0), 6, 6, PixelFormat::Rgb8, &[0, 0, 0]).unwrap();
    let spec = EffectSpec::new(EffectKind::Overlay)
        .with("source", &*png.to_string_lossy())
        .with("x", 1)
        .with("y", 1)
        .with("opacity", 0.5);
    let out = Overlay::new().apply(&f, &spec.params()).unwrap();
    assert_eq!(out.pixel(1, 1), &[100, 50, 0]);
    assert_eq!(out.pixel(2, 2), &[100, 50, 0]);
    assert_eq!(out.pixel(0, 0), &[0, 0, 0]);
    assert_eq!(out.pixel(3, 3), &[0, 0, 0]);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn overlay_that_does_not_fit_is_skipped() {
    let tmp = temp_dir("overlay_skip");
    std::fs::create_dir_all(&tmp).unwrap();
    let png = tmp.join("big.png");
    write_png(&png, 4, 4, [255, 255, 255, 255]);

    let f = Frame::filled(FrameIndex(0), 6, 6, PixelFormat::Gray8, &[7]).unwrap();
    let op = Overlay::new();
    for (x, y) in [(3, 0), (-1, 0), (0, 5)] {
        let spec = EffectSpec::new(EffectKind::Overlay)
            .with("source", &*png.to_string_lossy())
            .with("x", x)
            .with("y", y);
        assert_eq!(op.apply(&f, &spec.params()).unwrap(), f);
    }

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn missing_overlay_file_is_an_error() {
    let f = Frame::filled(FrameIndex(0), 6, 6, PixelFormat::Gray8, &[7]).unwrap();
    let spec = EffectSpec::new(EffectKind::Overlay).with("source", "/nonexistent/framelab.png");
    assert!(Overlay::new().apply(&f, &spec.params()).is_err());
}

#[test]
fn edited_overlay_file_is_reloaded() {
    let tmp = temp_dir("overlay_edit");
    std::fs::create_dir_all(&tmp).unwrap();
    let png = tmp.join("logo.png");
    write_png(&png, 2, 2, [200, 0, 0, 255]);

    let f = Frame::filled(FrameIndex(0), 6, 6, PixelFormat::Rgb8, &[0, 0, 0]).unwrap();
    let spec = EffectSpec::new(EffectKind::Overlay)
        .with("source", &*png.to_string_lossy())
        .with("x", 0)
        .with("y", 0);
    let stack = crate::effects::spec::EffectStack::new(vec![spec.clone()]);
    let op = Overlay::new();
    assert_eq!(op.apply(&f, &spec.params()).unwrap().pixel(0, 0), &[200, 0, 0]);
    let before = stack.fingerprint();

    std::thread::sleep(std::time::Duration::from_millis(20));
    write_png(&png, 3, 3, [0, 90, 0, 255]);
    assert_eq!(op.apply(&f, &spec.params()).unwrap().pixel(0, 0), &[0, 90, 0]);
    assert_ne!(stack.fingerprint(), before);
    assert_eq!(op.cached_images(), 1);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn decoded_images_are_bounded() {
    let tmp = temp_dir("overlay_bound");
    std::fs::create_dir_all(&tmp).unwrap();
    let png = tmp.join("dot.png");
    write_png(&png, 2, 2, [255, 255, 255, 255]);

    let f = Frame::filled(FrameIndex(0), 8, 8, PixelFormat::Gray8, &[0]).unwrap();
    let op = Overlay::new();
    for k in 1..=(MAX_IMAGES as u32 + 4) {
        let spec = EffectSpec::new(EffectKind::Overlay)
            .with("source", &*png.to_string_lossy())
            .with("scale", 1.0 + f64::from(k) * 0.01);
        op.apply(&f, &spec.params()).unwrap();
        assert!(op.cached_images() <= MAX_IMAGES);
    }

    std::fs::remove_dir_all(&tmp).ok();
}
