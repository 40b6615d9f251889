use super::*;
use crate::foundation::core::FrameIndex;
use crate::foundation::frame::PixelFormat;

fn gradient(w: u32, h: u32) -> Frame {
    let data = (0..w * h).map(|i| ((i * 7) % 256) as u8).collect();
    Frame::new(FrameIndex(4), w, h, PixelFormat::Gray8, data).unwrap()
}

fn step(w: u32, h: u32) -> Frame {
    let data = (0..h)
        .flat_map(|_| (0..w).map(move |x| if x < w / 2 { 20u8 } else { 220u8 }))
        .flat_map(|v| [v, v, v])
        .collect();
    Frame::new(FrameIndex(0), w, h, PixelFormat::Rgb8, data).unwrap()
}

#[test]
fn fingerprint_is_order_sensitive() {
    let a = EffectSpec::new(EffectKind::Brightness).with("value", 10);
    let b = EffectSpec::new(EffectKind::Grayscale);
    let ab = EffectStack::new(vec![a.clone(), b.clone()]);
    let ba = EffectStack::new(vec![b, a]);
    assert_ne!(ab.fingerprint(), ba.fingerprint());
    assert_eq!(ab.fingerprint(), ab.clone().fingerprint());
}

#[test]
fn fingerprint_tracks_params_and_enabled_flag() {
    let base = EffectStack::new(vec![EffectSpec::new(EffectKind::Brightness).with("value", 10)]);
    let other_value =
        EffectStack::new(vec![EffectSpec::new(EffectKind::Brightness).with("value", 11)]);
    let disabled = EffectStack::new(vec![
        EffectSpec::new(EffectKind::Brightness)
            .with("value", 10)
            .enabled(false),
    ]);
    assert_ne!(base.fingerprint(), other_value.fingerprint());
    assert_ne!(base.fingerprint(), disabled.fingerprint());
}

#[test]
fn empty_stack_is_identity() {
    let reg = EffectRegistry::with_builtins();
    let f = gradient(8, 4);
    let out = EffectStack::default().evaluate(&f, &reg);
    assert_eq!(out.frame, f);
    assert!(out.diagnostics.is_empty());
}

#[test]
fn disabled_effects_are_skipped() {
    let reg = EffectRegistry::with_builtins();
    let f = gradient(8, 4);
    let stack = EffectStack::new(vec![
        EffectSpec::new(EffectKind::Brightness)
            .with("value", 100)
            .enabled(false),
    ]);
    assert_eq!(stack.evaluate(&f, &reg).frame, f);
}

#[test]
fn unknown_kind_passes_through_with_diagnostic() {
    let reg = EffectRegistry::with_builtins();
    let f = gradient(8, 4);
    let stack = EffectStack::new(vec![
        EffectSpec::new(EffectKind::parse("sparkle")),
        EffectSpec::new(EffectKind::Brightness).with("value", 1),
    ]);
    let out = stack.evaluate(&f, &reg);
    assert_eq!(out.diagnostics.len(), 1);
    assert_eq!(out.diagnostics[0].effect_index, Some(0));
    assert_eq!(out.diagnostics[0].frame, Some(FrameIndex(4)));
    assert_eq!(out.frame.data()[0], f.data()[0] + 1);
}

#[test]
fn invalid_param_continues_on_last_valid_frame() {
    let reg = EffectRegistry::with_builtins();
    let f = gradient(8, 4);
    let stack = EffectStack::new(vec![
        EffectSpec::new(EffectKind::Brightness).with("value", 5),
        EffectSpec::new(EffectKind::Brightness).with("value", 999),
        EffectSpec::new(EffectKind::Brightness).with("value", "loud"),
    ]);
    let out = stack.evaluate(&f, &reg);
    let expected = EffectStack::new(vec![EffectSpec::new(EffectKind::Brightness).with("value", 5)])
        .evaluate(&f, &reg);
    assert_eq!(out.frame, expected.frame);
    let idx: Vec<_> = out.diagnostics.iter().map(|d| d.effect_index).collect();
    assert_eq!(idx, vec![Some(1), Some(2)]);
}

#[test]
fn evaluation_is_deterministic() {
    let reg = EffectRegistry::with_builtins();
    let f = step(16, 8);
    let stack = EffectStack::new(vec![
        EffectSpec::new(EffectKind::GaussianBlur)
            .with("kernel", 5)
            .with("sigma", 1.3),
        EffectSpec::new(EffectKind::ColorAdjust).with("contrast", 1.4),
        EffectSpec::new(EffectKind::EdgeDetect),
    ]);
    let a = stack.evaluate(&f, &reg).frame;
    let b = stack.evaluate(&f, &reg).frame;
    assert_eq!(a, b);
}

#[test]
fn edge_then_blur_differs_from_blur_then_edge() {
    let reg = EffectRegistry::with_builtins();
    let f = step(16, 8);
    let edge = EffectSpec::new(EffectKind::EdgeDetect);
    let blur = EffectSpec::new(EffectKind::GaussianBlur).with("kernel", 5);
    let eb = EffectStack::new(vec![edge.clone(), blur.clone()]).evaluate(&f, &reg);
    let be = EffectStack::new(vec![blur, edge]).evaluate(&f, &reg);
    assert!(eb.diagnostics.is_empty() && be.diagnostics.is_empty());
    assert_ne!(eb.frame, be.frame);
}

#[test]
fn output_size_folds_crops() {
    let reg = EffectRegistry::with_builtins();
    let stack = EffectStack::new(vec![
        EffectSpec::new(EffectKind::Crop)
            .with("x", 2)
            .with("y", 2)
            .with("width", 10)
            .with("height", 6),
        EffectSpec::new(EffectKind::Crop)
            .with("width", 4)
            .with("height", 4),
        EffectSpec::new(EffectKind::Crop)
            .with("width", 40)
            .with("height", 4),
    ]);
    assert_eq!(stack.output_size(16, 8, &reg), (4, 4));
    let out = stack.evaluate(&gradient(16, 8), &reg);
    assert_eq!((out.frame.width(), out.frame.height()), (4, 4));
    assert_eq!(out.diagnostics.len(), 1);
}

#[test]
fn output_origin_accumulates_crop_offsets() {
    let reg = EffectRegistry::with_builtins();
    let stack = EffectStack::new(vec![
        EffectSpec::new(EffectKind::Crop)
            .with("x", 2)
            .with("y", 1)
            .with("width", 10)
            .with("height", 6),
        EffectSpec::new(EffectKind::Brightness).with("value", 5),
        EffectSpec::new(EffectKind::Crop)
            .with("x", 3)
            .with("width", 4)
            .with("height", 4),
    ]);
    assert_eq!(stack.output_origin(16, 8, &reg), Vec2::new(5.0, 1.0));
    assert_eq!(EffectStack::default().output_origin(16, 8, &reg), Vec2::ZERO);
}

#[test]
fn stack_json_round_trips_unknown_kinds() {
    let stack = EffectStack::new(vec![
        EffectSpec::new(EffectKind::parse("vignette")).with("amount", 0.25),
        EffectSpec::new(EffectKind::Overlay).with("source", "logo.png"),
    ]);
    let json = serde_json::to_string(&stack).unwrap();
    let back: EffectStack = serde_json::from_str(&json).unwrap();
    assert_eq!(back, stack);
    assert_eq!(back.fingerprint(), stack.fingerprint());
    assert_eq!(back.specs()[0].kind, EffectKind::Other("vignette".to_owned()));
}

#[test]
fn kind_aliases_parse() {
    assert_eq!(EffectKind::parse("canny"), EffectKind::EdgeDetect);
    assert_eq!(EffectKind::parse("Gaussian-Blur"), EffectKind::GaussianBlur);
    assert_eq!(EffectKind::parse("color_adjust").tag(), "color_adjust");
}

#[test]
fn missing_enabled_defaults_to_true() {
    let spec: EffectSpec = serde_json::from_str(r#"{"kind":"grayscale"}"#).unwrap();
    assert!(spec.enabled);
    assert!(spec.params.is_empty());
}
