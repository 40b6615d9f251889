use crate::cache::{CacheKey, FrameCache};
use crate::effects::{EffectRegistry, EffectStack};
use crate::fingerprint::Fingerprint;
use crate::foundation::core::{FrameIndex, Vec2};
use crate::foundation::diagnostic::Diagnostic;
use crate::foundation::error::FramelabResult;
use crate::foundation::frame::Frame;
use crate::stabilize::{StabilizationParams, StabilizationPlan};

/// A frame after effects and stabilization.
#[derive(Clone, Debug)]
pub(crate) struct ProcessedFrame {
    pub(crate) frame: Frame,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) cached: bool,
}

/// Per-frame process step shared by pipeline workers and preview sessions: cache lookup, effect
/// evaluation, stabilization warp, cache fill.
#[derive(Clone, Copy)]
pub(crate) struct FrameProcessor<'a> {
    effects: &'a EffectStack,
    registry: &'a EffectRegistry,
    plan: Option<&'a StabilizationPlan>,
    origin: Vec2,
    source_fp: Fingerprint,
    stack_fp: Fingerprint,
    stabilization_fp: Fingerprint,
}

impl<'a> FrameProcessor<'a> {
    /// `width x height` is the source frame size; `plan` is required for stabilized output.
    pub(crate) fn new(
        source_fp: Fingerprint,
        effects: &'a EffectStack,
        registry: &'a EffectRegistry,
        stabilization: &StabilizationParams,
        plan: Option<&'a StabilizationPlan>,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            effects,
            registry,
            plan,
            origin: effects.output_origin(width, height, registry),
            source_fp,
            stack_fp: effects.fingerprint(),
            stabilization_fp: plan.map_or_else(|| stabilization.fingerprint(), |p| p.fingerprint()),
        }
    }

    pub(crate) fn key(&self, frame: FrameIndex) -> CacheKey {
        CacheKey {
            source: self.source_fp,
            frame,
            stack: self.stack_fp,
            stabilization: self.stabilization_fp,
        }
    }

    pub(crate) fn process(&self, frame: &Frame, cache: &FrameCache) -> FramelabResult<ProcessedFrame> {
        let key = self.key(frame.index());
        if let Some((frame, diagnostics)) = cache.get_with_diagnostics(&key) {
            return Ok(ProcessedFrame {
                frame,
                diagnostics,
                cached: true,
            });
        }
        let evaluated = self.effects.evaluate(frame, self.registry);
        let out = match self.plan {
            Some(plan) => plan.apply(&evaluated.frame, self.origin)?,
            None => evaluated.frame,
        };
        cache.put_with_diagnostics(key, out.clone(), evaluated.diagnostics.clone());
        Ok(ProcessedFrame {
            frame: out,
            diagnostics: evaluated.diagnostics,
            cached: false,
        })
    }
}
