use std::collections::BTreeMap;
use std::path::Path;

use crate::effects::params::EffectParams;
use crate::effects::registry::EffectRegistry;
use crate::fingerprint::{Fingerprint, StableHasher};
use crate::foundation::core::Vec2;
use crate::foundation::diagnostic::Diagnostic;
use crate::foundation::error::FramelabError;
use crate::foundation::frame::Frame;
use crate::io::source::hash_file;

/// Effect kind tag.
///
/// Unrecognized tags are kept verbatim in [`EffectKind::Other`] so configurations round-trip even
/// when this build has no transform registered for them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EffectKind {
    /// Add a constant to every color channel.
    Brightness,
    /// Contrast gain plus brightness offset, absolute value, saturated.
    ColorAdjust,
    /// Separable gaussian blur.
    GaussianBlur,
    /// Canny edge map.
    EdgeDetect,
    /// Luma replicated into the color channels.
    Grayscale,
    /// Axis-aligned crop; changes output geometry.
    Crop,
    /// Alpha-blend an image onto the frame.
    Overlay,
    /// Any other tag.
    Other(String),
}

impl EffectKind {
    /// Canonical tag used in project files.
    pub fn tag(&self) -> &str {
        match self {
            Self::Brightness => "brightness",
            Self::ColorAdjust => "color_adjust",
            Self::GaussianBlur => "gaussian_blur",
            Self::EdgeDetect => "edge_detect",
            Self::Grayscale => "grayscale",
            Self::Crop => "crop",
            Self::Overlay => "overlay",
            Self::Other(s) => s,
        }
    }

    /// Parse a tag, accepting the aliases older project files used.
    pub fn parse(tag: &str) -> Self {
        let norm = tag.trim().to_ascii_lowercase().replace('-', "_");
        match norm.as_str() {
            "brightness" => Self::Brightness,
            "color_adjust" | "coloradjust" => Self::ColorAdjust,
            "gaussian_blur" | "blur" => Self::GaussianBlur,
            "edge_detect" | "canny" | "edges" => Self::EdgeDetect,
            "grayscale" | "gray" => Self::Grayscale,
            "crop" => Self::Crop,
            "overlay" => Self::Overlay,
            _ => Self::Other(tag.to_owned()),
        }
    }
}

impl From<String> for EffectKind {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<EffectKind> for String {
    fn from(k: EffectKind) -> Self {
        k.tag().to_owned()
    }
}

impl std::fmt::Display for EffectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// One parameter value: a number or a string.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Numeric parameter.
    Number(f64),
    /// Textual parameter (paths, names).
    Text(String),
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

fn default_enabled() -> bool {
    true
}

/// One entry of an effect stack.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EffectSpec {
    /// Effect kind.
    pub kind: EffectKind,
    /// Disabled entries are skipped but keep their position.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Named parameters.
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
}

impl EffectSpec {
    /// Enabled spec with no parameters.
    pub fn new(kind: EffectKind) -> Self {
        Self {
            kind,
            enabled: true,
            params: BTreeMap::new(),
        }
    }

    /// Builder-style parameter setter.
    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.to_owned(), value.into());
        self
    }

    /// Builder-style enabled flag.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Parameter accessor bound to this spec.
    pub fn params(&self) -> EffectParams<'_> {
        EffectParams::new(&self.kind, &self.params)
    }
}

/// Ordered list of effects; order is part of identity.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct EffectStack {
    specs: Vec<EffectSpec>,
}

/// Output of [`EffectStack::evaluate`].
#[derive(Clone, Debug)]
pub struct Evaluated {
    /// Processed frame (same index as the input).
    pub frame: Frame,
    /// Effects that were passed through, with the reason.
    pub diagnostics: Vec<Diagnostic>,
}

impl EffectStack {
    /// Stack from an ordered list of specs.
    pub fn new(specs: Vec<EffectSpec>) -> Self {
        Self { specs }
    }

    /// Append a spec at the end.
    pub fn push(&mut self, spec: EffectSpec) {
        self.specs.push(spec);
    }

    /// Specs in application order.
    pub fn specs(&self) -> &[EffectSpec] {
        &self.specs
    }

    /// Mutable access for editors; any change yields a new fingerprint.
    pub fn specs_mut(&mut self) -> &mut Vec<EffectSpec> {
        &mut self.specs
    }

    /// Number of specs, disabled ones included.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// `true` when the stack has no specs.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Order-sensitive fingerprint over kinds, enabled flags and parameter values, plus the
    /// length and modification time of overlay image files.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut h = StableHasher::new();
        h.write_str("effect_stack");
        h.write_u32(self.specs.len() as u32);
        for spec in &self.specs {
            h.write_str(spec.kind.tag());
            h.write_bool(spec.enabled);
            h.write_u32(spec.params.len() as u32);
            for (name, value) in &spec.params {
                h.write_str(name);
                match value {
                    ParamValue::Number(v) => {
                        h.write_u8(0);
                        h.write_f64(*v);
                    }
                    ParamValue::Text(s) => {
                        h.write_u8(1);
                        h.write_str(s);
                    }
                }
            }
            // Overlay output depends on the image file, not just its name.
            if spec.kind == EffectKind::Overlay
                && let Some(ParamValue::Text(path)) = spec.params.get("source")
            {
                hash_file(&mut h, Path::new(path));
            }
        }
        h.finish()
    }

    /// Output size for a `width x height` input: the fold of every enabled effect's output size.
    ///
    /// Effects that would be passed through at evaluation time keep the size unchanged here too.
    pub fn output_size(&self, width: u32, height: u32, registry: &EffectRegistry) -> (u32, u32) {
        let mut size = (width, height);
        for spec in self.specs.iter().filter(|s| s.enabled) {
            if let Some(op) = registry.get(&spec.kind)
                && let Ok(next) = op.output_size(size.0, size.1, &spec.params())
            {
                size = next;
            }
        }
        size
    }

    /// Offset of the stack's output origin in input pixel coordinates, folded like
    /// [`EffectStack::output_size`].
    pub fn output_origin(&self, width: u32, height: u32, registry: &EffectRegistry) -> Vec2 {
        let mut size = (width, height);
        let mut origin = Vec2::ZERO;
        for spec in self.specs.iter().filter(|s| s.enabled) {
            let Some(op) = registry.get(&spec.kind) else {
                continue;
            };
            let params = spec.params();
            if let (Ok(next), Ok((ox, oy))) = (
                op.output_size(size.0, size.1, &params),
                op.output_origin(size.0, size.1, &params),
            ) {
                origin += Vec2::new(f64::from(ox), f64::from(oy));
                size = next;
            }
        }
        origin
    }

    /// Apply every enabled effect in order.
    ///
    /// An effect that is unknown or rejects its parameters is passed through: a diagnostic is
    /// recorded and evaluation continues on the last valid frame.
    #[tracing::instrument(level = "trace", skip_all, fields(frame = frame.index().0))]
    pub fn evaluate(&self, frame: &Frame, registry: &EffectRegistry) -> Evaluated {
        let mut current = frame.clone();
        let mut diagnostics = Vec::new();
        for (i, spec) in self.specs.iter().enumerate() {
            if !spec.enabled {
                continue;
            }
            let result = match registry.get(&spec.kind) {
                Some(op) => op.apply(&current, &spec.params()),
                None => Err(FramelabError::validation(format!(
                    "unknown effect kind '{}'",
                    spec.kind
                ))),
            };
            match result {
                Ok(next) => current = next.with_index(frame.index()),
                Err(e) => {
                    tracing::warn!(
                        frame = frame.index().0,
                        effect_index = i,
                        kind = %spec.kind,
                        "effect passed through: {e}"
                    );
                    diagnostics.push(Diagnostic::effect(frame.index(), i, e.to_string()));
                }
            }
        }
        Evaluated {
            frame: current,
            diagnostics,
        }
    }
}

impl FromIterator<EffectSpec> for EffectStack {
    fn from_iter<I: IntoIterator<Item = EffectSpec>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/spec.rs"]
mod tests;
