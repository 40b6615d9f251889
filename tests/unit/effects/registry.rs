use super::*;
use crate::effects::spec::{EffectSpec, EffectStack};
use crate::foundation::core::FrameIndex;
use crate::foundation::frame::PixelFormat;

#[test]
fn builtins_cover_known_kinds() {
    let r = EffectRegistry::with_builtins();
    for kind in [
        EffectKind::Brightness,
        EffectKind::ColorAdjust,
        EffectKind::GaussianBlur,
        EffectKind::EdgeDetect,
        EffectKind::Grayscale,
        EffectKind::Crop,
        EffectKind::Overlay,
    ] {
        assert!(r.contains(&kind), "{kind}");
    }
    assert!(!r.contains(&EffectKind::Other("x".into())));
}

#[test]
fn register_adds_custom_closure_effect() {
    let mut r = EffectRegistry::with_builtins();
    let kind = EffectKind::Other("invert".into());
    let replaced = r.register(kind.clone(), |frame: &Frame, _p: &EffectParams<'_>| {
        let data = frame.data().iter().map(|v| 255 - v).collect();
        frame.derive(frame.width(), frame.height(), data)
    });
    assert!(replaced.is_none());

    let f = Frame::new(FrameIndex(0), 2, 1, PixelFormat::Gray8, vec![0, 200]).unwrap();
    let out = EffectStack::new(vec![EffectSpec::new(kind)]).evaluate(&f, &r);
    assert_eq!(out.frame.data(), &[255, 55]);
}

#[test]
fn register_replaces_existing_entry() {
    let mut r = EffectRegistry::with_builtins();
    let old = r.register(EffectKind::Grayscale, |frame: &Frame, _p: &EffectParams<'_>| {
        Ok(frame.clone())
    });
    assert!(old.is_some());
}
