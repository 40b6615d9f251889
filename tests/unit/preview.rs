use super::*;
use crate::effects::{EffectKind, EffectSpec};
use crate::foundation::core::Fps;
use crate::foundation::frame::PixelFormat;
use crate::io::InMemorySource;

fn source(frames: u64) -> Box<dyn FrameSource> {
    Box::new(
        InMemorySource::from_fn(frames, Fps::new(25, 1).unwrap(), |i| {
            let data = (0..16 * 16 * 3).map(|k| ((k + i.0 as usize) % 200) as u8).collect();
            Frame::new(i, 16, 16, PixelFormat::Rgb8, data)
        })
        .unwrap(),
    )
}

fn brightness(value: i32) -> ProjectConfig {
    let mut cfg = ProjectConfig::default();
    cfg.effects.push(EffectSpec::new(EffectKind::Brightness).with("value", value));
    cfg
}

#[test]
fn renders_at_preview_scale_and_reuses_cache() {
    let cache = Arc::new(FrameCache::new(1 << 20));
    let mut session = PreviewSession::new(source(4), brightness(10), Arc::clone(&cache)).unwrap();

    let first = session.render(FrameIndex(2)).unwrap();
    assert_eq!((first.frame.width(), first.frame.height()), (8, 8));
    assert_eq!(first.full_size, (16, 16));
    assert_eq!(first.frame.index(), FrameIndex(2));
    assert!(!first.cached);

    let again = session.render(FrameIndex(2)).unwrap();
    assert!(again.cached);
    assert_eq!(again.frame, first.frame);
    assert_eq!(cache.len(), 1);
}

#[test]
fn config_changes_use_new_cache_keys() {
    let cache = Arc::new(FrameCache::new(1 << 20));
    let mut session = PreviewSession::new(source(4), brightness(10), Arc::clone(&cache)).unwrap();
    session.render(FrameIndex(0)).unwrap();
    session.set_config(brightness(30)).unwrap();
    assert!(!session.render(FrameIndex(0)).unwrap().cached);
    session.set_config(brightness(10)).unwrap();
    assert!(session.render(FrameIndex(0)).unwrap().cached);
}

#[test]
fn sessions_over_different_sources_share_a_cache_safely() {
    let cache = Arc::new(FrameCache::new(1 << 20));
    let mut a = PreviewSession::new(source(4), brightness(10), Arc::clone(&cache)).unwrap();
    let flat = InMemorySource::from_fn(4, Fps::new(25, 1).unwrap(), |i| {
        Frame::filled(i, 16, 16, PixelFormat::Rgb8, &[50, 50, 50])
    })
    .unwrap();
    let mut b = PreviewSession::new(Box::new(flat), brightness(10), Arc::clone(&cache)).unwrap();

    let from_a = a.render(FrameIndex(1)).unwrap();
    let from_b = b.render(FrameIndex(1)).unwrap();
    assert!(!from_b.cached);
    assert_ne!(from_a.frame, from_b.frame);
    assert_eq!(cache.len(), 2);
}

#[test]
fn cached_render_keeps_pass_through_diagnostics() {
    let mut session =
        PreviewSession::new(source(2), brightness(-300), Arc::new(FrameCache::new(1 << 20)))
            .unwrap();
    assert_eq!(session.render(FrameIndex(0)).unwrap().diagnostics.len(), 1);
    let warm = session.render(FrameIndex(0)).unwrap();
    assert!(warm.cached);
    assert_eq!(warm.diagnostics.len(), 1);
}

#[test]
fn full_scale_preview_matches_processed_frame() {
    let mut cfg = brightness(-300);
    cfg.preview_scale = 1.0;
    let mut session = PreviewSession::new(source(2), cfg, Arc::new(FrameCache::new(0))).unwrap();
    let out = session.render(FrameIndex(1)).unwrap();
    assert_eq!(out.diagnostics.len(), 1);
    assert_eq!(out.frame.width(), 16);
}

#[test]
fn out_of_range_frames_are_rejected() {
    let mut cfg = ProjectConfig::default();
    cfg.range = Some(FrameRange::new(FrameIndex(1), FrameIndex(3)).unwrap());
    let mut session = PreviewSession::new(source(4), cfg, Arc::new(FrameCache::new(0))).unwrap();
    assert!(session.render(FrameIndex(0)).is_err());
    assert!(session.render(FrameIndex(1)).is_ok());

    let mut bad = ProjectConfig::default();
    bad.range = Some(FrameRange::new(FrameIndex(0), FrameIndex(9)).unwrap());
    assert!(session.set_config(bad).is_err());
}

#[test]
fn stabilization_plan_is_built_once_and_dropped_on_change() {
    let mut cfg = ProjectConfig::default();
    cfg.stabilization.enabled = true;
    let mut session = PreviewSession::new(source(5), cfg.clone(), Arc::new(FrameCache::new(0))).unwrap();
    assert!(session.plan.is_none());
    let len = session.stabilization_plan().unwrap().map(|p| p.corrections().len());
    assert_eq!(len, Some(5));
    session.render(FrameIndex(3)).unwrap();
    assert!(session.plan.is_some());

    cfg.effects.push(EffectSpec::new(EffectKind::Grayscale));
    session.set_config(cfg.clone()).unwrap();
    assert!(session.plan.is_some());
    cfg.stabilization.strength = 40.0;
    session.set_config(cfg).unwrap();
    assert!(session.plan.is_none());
}

#[test]
fn snapshot_writes_full_resolution_png() {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("framelab_snapshot_{}_{nanos}", std::process::id()));
    let path = dir.join("shot.png");
    let mut session =
        PreviewSession::new(source(3), brightness(5), Arc::new(FrameCache::new(0))).unwrap();
    session.snapshot(FrameIndex(1), &path).unwrap();
    let img = image::open(&path).unwrap();
    assert_eq!((img.width(), img.height()), (16, 16));
    let _ = std::fs::remove_dir_all(&dir);
}
