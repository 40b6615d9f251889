//! JSON project snapshot: everything needed to re-run or preview a project.
//!
//! `load(save(c)) == c` holds for every valid configuration; unknown effect tags survive the
//! round-trip as [`crate::EffectKind::Other`].

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::effects::EffectStack;
use crate::foundation::core::{FrameIndex, FrameRange};
use crate::foundation::error::{FramelabError, FramelabResult};
use crate::io::ensure_parent_dir;
use crate::motion::TrackerParams;
use crate::pipeline::{Destination, Job, JobId, PipelineOpts};
use crate::stabilize::StabilizationParams;

/// Default frame cache budget: 512 MiB.
pub const DEFAULT_CACHE_BUDGET_BYTES: usize = 512 * 1024 * 1024;

/// Named position on the timeline.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Marker {
    /// Frame the marker sits on.
    pub frame: FrameIndex,
    /// Label.
    pub name: String,
}

/// Project configuration.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Effects applied to every frame, in order.
    pub effects: EffectStack,
    /// Stabilization settings.
    pub stabilization: StabilizationParams,
    /// Frames to process; `None` covers the whole source.
    pub range: Option<FrameRange>,
    /// Byte budget of the processed-frame cache.
    pub cache_budget_bytes: usize,
    /// Scheduler settings for exports.
    pub pipeline: PipelineOpts,
    /// Preview downscale factor in `(0, 1]`.
    pub preview_scale: f64,
    /// Timeline markers.
    pub markers: Vec<Marker>,
    /// Point tracker settings.
    pub tracker: TrackerParams,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            effects: EffectStack::default(),
            stabilization: StabilizationParams::default(),
            range: None,
            cache_budget_bytes: DEFAULT_CACHE_BUDGET_BYTES,
            pipeline: PipelineOpts::default(),
            preview_scale: 0.5,
            markers: Vec::new(),
            tracker: TrackerParams::default(),
        }
    }
}

impl ProjectConfig {
    /// Parse from a JSON reader.
    pub fn from_reader<R: Read>(r: R) -> FramelabResult<Self> {
        let cfg: Self = serde_json::from_reader(r)
            .map_err(|e| FramelabError::serde(format!("parse project JSON: {e}")))?;
        Ok(cfg)
    }

    /// Parse from a JSON string.
    pub fn from_json(s: &str) -> FramelabResult<Self> {
        Self::from_reader(s.as_bytes())
    }

    /// Load and validate a JSON file.
    pub fn load(path: impl AsRef<Path>) -> FramelabResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            FramelabError::validation(format!("open project JSON '{}': {e}", path.display()))
        })?;
        let cfg = Self::from_reader(BufReader::new(f))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> FramelabResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write as pretty-printed JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> FramelabResult<()> {
        use anyhow::Context as _;

        let path = path.as_ref();
        ensure_parent_dir(path)?;
        let f = File::create(path)
            .with_context(|| format!("failed to create '{}'", path.display()))?;
        let mut w = BufWriter::new(f);
        serde_json::to_writer_pretty(&mut w, self)?;
        w.write_all(b"\n")
            .and_then(|()| w.flush())
            .with_context(|| format!("failed to write '{}'", path.display()))?;
        Ok(())
    }

    /// Check settings that would otherwise only fail when a job starts.
    ///
    /// Effect parameters are not checked here: bad effects are passed through with a diagnostic.
    pub fn validate(&self) -> FramelabResult<()> {
        if !(self.preview_scale > 0.0 && self.preview_scale <= 1.0) {
            return Err(FramelabError::validation("preview_scale must be in (0, 1]"));
        }
        if let Some(r) = self.range
            && FrameRange::new(r.start, r.end)?.is_empty()
        {
            return Err(FramelabError::validation("range must be non-empty"));
        }
        self.stabilization.validate()?;
        self.pipeline.validate()
    }

    /// Markers ordered by frame; markers on the same frame keep their insertion order.
    pub fn markers_by_frame(&self) -> Vec<&Marker> {
        let mut out: Vec<&Marker> = self.markers.iter().collect();
        out.sort_by_key(|m| m.frame);
        out
    }

    /// First marker named `name`, in frame order.
    pub fn find_marker(&self, name: &str) -> Option<&Marker> {
        self.markers_by_frame().into_iter().find(|m| m.name == name)
    }

    /// Export job for this configuration.
    pub fn job(&self, id: JobId, destination: Destination) -> Job {
        Job {
            id,
            effects: self.effects.clone(),
            stabilization: self.stabilization,
            range: self.range,
            destination,
            pipeline: self.pipeline,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/config.rs"]
mod tests;
