//! Interactive single-frame path.
//!
//! A preview session renders one frame at a time through the same processor export jobs use, so
//! frames rendered here are served from the shared cache when an export reaches them (and the
//! other way round). Output is downscaled by the configured preview scale.

use std::path::Path;
use std::sync::Arc;

use crate::cache::FrameCache;
use crate::config::ProjectConfig;
use crate::effects::EffectRegistry;
use crate::foundation::core::{FrameIndex, FrameRange};
use crate::foundation::diagnostic::Diagnostic;
use crate::foundation::error::{FramelabError, FramelabResult};
use crate::foundation::frame::Frame;
use crate::io::sequence::save_png;
use crate::io::{FrameSource, SourceInfo, ensure_parent_dir};
use crate::pipeline::process::{FrameProcessor, ProcessedFrame};
use crate::pipeline::{CancelToken, analyze, resolve_range};
use crate::stabilize::StabilizationPlan;

/// One rendered preview frame.
#[derive(Clone, Debug)]
pub struct PreviewFrame {
    /// Processed frame at preview resolution.
    pub frame: Frame,
    /// Size of the full-resolution processed frame.
    pub full_size: (u32, u32),
    /// Effects passed through while processing.
    pub diagnostics: Vec<Diagnostic>,
    /// Whether the full-resolution frame came from the cache.
    pub cached: bool,
}

/// Per-project preview state: source, configuration, and the stabilization plan once analyzed.
pub struct PreviewSession {
    source: Box<dyn FrameSource>,
    config: ProjectConfig,
    cache: Arc<FrameCache>,
    registry: EffectRegistry,
    plan: Option<StabilizationPlan>,
}

impl PreviewSession {
    /// Session over `source` with the built-in effects.
    pub fn new(
        source: Box<dyn FrameSource>,
        config: ProjectConfig,
        cache: Arc<FrameCache>,
    ) -> FramelabResult<Self> {
        config.validate()?;
        resolve_range(config.range, &source.info())?;
        Ok(Self {
            source,
            config,
            cache,
            registry: EffectRegistry::with_builtins(),
            plan: None,
        })
    }

    /// Resolve effects through `registry` instead of the built-ins.
    pub fn with_registry(mut self, registry: EffectRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Source properties.
    pub fn info(&self) -> SourceInfo {
        self.source.info()
    }

    /// Frames the session covers.
    pub fn range(&self) -> FramelabResult<FrameRange> {
        resolve_range(self.config.range, &self.source.info())
    }

    /// Replace the configuration. The stabilization plan is dropped when its inputs changed;
    /// cached frames stay valid because configuration is part of every cache key.
    pub fn set_config(&mut self, config: ProjectConfig) -> FramelabResult<()> {
        config.validate()?;
        resolve_range(config.range, &self.source.info())?;
        if config.stabilization != self.config.stabilization || config.range != self.config.range {
            tracing::debug!("stabilization inputs changed, plan dropped");
            self.plan = None;
        }
        self.config = config;
        Ok(())
    }

    /// Stabilization plan for the current configuration, running the analysis pass on first use.
    /// `None` while stabilization is disabled.
    pub fn stabilization_plan(&mut self) -> FramelabResult<Option<&StabilizationPlan>> {
        if !self.config.stabilization.enabled {
            return Ok(None);
        }
        if self.plan.is_none() {
            let range = self.range()?;
            let analysis = analyze(
                &self.config.stabilization,
                &self.config.pipeline,
                self.source.as_mut(),
                range,
                &CancelToken::new(),
            )?;
            self.plan = Some(analysis.plan);
        }
        Ok(self.plan.as_ref())
    }

    fn process(&mut self, idx: FrameIndex) -> FramelabResult<ProcessedFrame> {
        let range = self.range()?;
        if !range.contains(idx) {
            return Err(FramelabError::validation(format!(
                "frame {idx} is outside the project range"
            )));
        }
        self.stabilization_plan()?;
        let frame = self.source.read(idx)?;
        let info = self.source.info();
        let processor = FrameProcessor::new(
            self.source.fingerprint(),
            &self.config.effects,
            &self.registry,
            &self.config.stabilization,
            self.plan.as_ref(),
            info.width,
            info.height,
        );
        processor.process(&frame, &self.cache)
    }

    /// Render frame `idx` at preview scale.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn render(&mut self, idx: FrameIndex) -> FramelabResult<PreviewFrame> {
        let processed = self.process(idx)?;
        let full_size = (processed.frame.width(), processed.frame.height());
        let scale = self.config.preview_scale;
        let frame = if scale < 1.0 {
            processed.frame.downscale(scale)?
        } else {
            processed.frame
        };
        Ok(PreviewFrame {
            frame,
            full_size,
            diagnostics: processed.diagnostics,
            cached: processed.cached,
        })
    }

    /// Write the full-resolution processed frame `idx` as a PNG.
    pub fn snapshot(&mut self, idx: FrameIndex, path: impl AsRef<Path>) -> FramelabResult<()> {
        let path = path.as_ref();
        let processed = self.process(idx)?;
        ensure_parent_dir(path)?;
        save_png(&processed.frame, path)?;
        tracing::info!(frame = idx.0, path = %path.display(), "snapshot written");
        Ok(())
    }
}

impl std::fmt::Debug for PreviewSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewSession")
            .field("info", &self.source.info())
            .field("config", &self.config)
            .field("has_plan", &self.plan.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/preview.rs"]
mod tests;
