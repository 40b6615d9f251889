use crate::foundation::core::FrameIndex;

/// Pipeline stage a diagnostic or failure originates from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Reading frames from the source.
    Decode,
    /// Stabilization analysis pass (motion estimation, trajectory).
    Analyze,
    /// Effect evaluation and stabilization warp.
    Process,
    /// Writing frames to the sink.
    Encode,
    /// Job setup before any stage starts.
    Setup,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Decode => "decode",
            Self::Analyze => "analyze",
            Self::Process => "process",
            Self::Encode => "encode",
            Self::Setup => "setup",
        };
        f.write_str(s)
    }
}

/// Non-fatal condition absorbed by a stage.
///
/// Diagnostics are logged at `warn` level where they occur and collected into reports.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Diagnostic {
    /// Stage that absorbed the condition.
    pub stage: Stage,
    /// Frame concerned, when known.
    pub frame: Option<FrameIndex>,
    /// Position of the effect in its stack, for effect diagnostics.
    pub effect_index: Option<usize>,
    /// Human-readable description.
    pub message: String,
}

impl Diagnostic {
    /// Diagnostic not tied to a particular effect.
    pub fn new(stage: Stage, frame: Option<FrameIndex>, message: impl Into<String>) -> Self {
        Self {
            stage,
            frame,
            effect_index: None,
            message: message.into(),
        }
    }

    /// Diagnostic for the effect at `effect_index` while processing `frame`.
    pub fn effect(frame: FrameIndex, effect_index: usize, message: impl Into<String>) -> Self {
        Self {
            stage: Stage::Process,
            frame: Some(frame),
            effect_index: Some(effect_index),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.stage)?;
        if let Some(frame) = self.frame {
            write!(f, " frame {}", frame.0)?;
        }
        if let Some(i) = self.effect_index {
            write!(f, " effect #{i}")?;
        }
        write!(f, ": {}", self.message)
    }
}
