use std::collections::HashMap;
use std::sync::Arc;

use crate::effects::params::EffectParams;
use crate::effects::spec::EffectKind;
use crate::effects::{blur, color, edges, geometry, overlay};
use crate::foundation::error::FramelabResult;
use crate::foundation::frame::Frame;

/// A pure per-frame transform.
///
/// Implementations must be deterministic: the same input frame and parameters always produce the
/// same output bytes. Closures with the `apply` signature implement this trait directly.
pub trait EffectOp: Send + Sync {
    /// Output size for a `width x height` input. Defaults to the input size.
    fn output_size(
        &self,
        width: u32,
        height: u32,
        params: &EffectParams<'_>,
    ) -> FramelabResult<(u32, u32)> {
        let _ = params;
        Ok((width, height))
    }

    /// Position of the output's top-left pixel in input coordinates. Defaults to the origin.
    fn output_origin(
        &self,
        width: u32,
        height: u32,
        params: &EffectParams<'_>,
    ) -> FramelabResult<(u32, u32)> {
        let _ = (width, height, params);
        Ok((0, 0))
    }

    /// Transform one frame.
    fn apply(&self, frame: &Frame, params: &EffectParams<'_>) -> FramelabResult<Frame>;
}

impl<F> EffectOp for F
where
    F: Fn(&Frame, &EffectParams<'_>) -> FramelabResult<Frame> + Send + Sync,
{
    fn apply(&self, frame: &Frame, params: &EffectParams<'_>) -> FramelabResult<Frame> {
        self(frame, params)
    }
}

/// Registration table mapping effect kinds to transforms.
///
/// Cloning is cheap; entries are shared.
#[derive(Clone)]
pub struct EffectRegistry {
    ops: HashMap<EffectKind, Arc<dyn EffectOp>>,
}

impl EffectRegistry {
    /// Registry with no entries.
    pub fn empty() -> Self {
        Self {
            ops: HashMap::new(),
        }
    }

    /// Registry with every built-in effect.
    pub fn with_builtins() -> Self {
        let mut r = Self::empty();
        r.register(EffectKind::Brightness, color::Brightness);
        r.register(EffectKind::ColorAdjust, color::ColorAdjust);
        r.register(EffectKind::Grayscale, color::Grayscale);
        r.register(EffectKind::GaussianBlur, blur::GaussianBlur);
        r.register(EffectKind::EdgeDetect, edges::EdgeDetect);
        r.register(EffectKind::Crop, geometry::Crop);
        r.register(EffectKind::Overlay, overlay::Overlay::new());
        r
    }

    /// Add or replace the transform for `kind`, returning the replaced entry.
    pub fn register(
        &mut self,
        kind: EffectKind,
        op: impl EffectOp + 'static,
    ) -> Option<Arc<dyn EffectOp>> {
        self.ops.insert(kind, Arc::new(op))
    }

    /// Transform registered for `kind`.
    pub fn get(&self, kind: &EffectKind) -> Option<&Arc<dyn EffectOp>> {
        self.ops.get(kind)
    }

    /// `true` when `kind` has a transform.
    pub fn contains(&self, kind: &EffectKind) -> bool {
        self.ops.contains_key(kind)
    }
}

impl Default for EffectRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.ops.keys().map(EffectKind::tag).collect();
        kinds.sort_unstable();
        f.debug_struct("EffectRegistry").field("kinds", &kinds).finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/registry.rs"]
mod tests;
