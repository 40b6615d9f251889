//! Camera-shake stabilization.
//!
//! Motion samples are integrated into a [`Trajectory`] of cumulative poses. The smoothed
//! trajectory yields one corrective transform per frame, blended by strength and bundled with
//! the border treatment into a [`StabilizationPlan`] that process workers read concurrently.

mod plan;
mod trajectory;
pub(crate) mod warp;

pub use plan::{CropRect, StabilizationPlan};
pub use trajectory::Trajectory;

use crate::fingerprint::{Fingerprint, StableHasher};
use crate::foundation::error::{FramelabError, FramelabResult};
use crate::motion::EstimatorParams;

/// Treatment of regions a correction exposes outside the source frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderPolicy {
    /// Crop every frame to the largest rectangle valid across the whole range (even dimensions).
    Crop,
    /// Repeat edge pixels; keeps the full frame size.
    #[default]
    Replicate,
    /// Reflect the image at its edges; keeps the full frame size.
    Mirror,
}

/// Stabilization settings of a job.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StabilizationParams {
    /// Run the analysis pass and apply corrections.
    pub enabled: bool,
    /// Correction strength in percent, `0..=100`.
    pub strength: f64,
    /// Half-width of the smoothing window, in frames.
    pub smoothing_radius: u32,
    /// Border treatment.
    pub border: BorderPolicy,
    /// Motion estimation used by the analysis pass.
    pub estimator: EstimatorParams,
}

impl Default for StabilizationParams {
    fn default() -> Self {
        Self {
            enabled: false,
            strength: 100.0,
            smoothing_radius: 15,
            border: BorderPolicy::default(),
            estimator: EstimatorParams::default(),
        }
    }
}

impl StabilizationParams {
    /// Check strength and estimator settings.
    pub fn validate(&self) -> FramelabResult<()> {
        if !(0.0..=100.0).contains(&self.strength) {
            return Err(FramelabError::validation(
                "stabilization.strength must be in [0, 100]",
            ));
        }
        self.estimator.validate()
    }

    /// Cache-key component. Every disabled configuration shares one fingerprint.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut h = StableHasher::new();
        h.write_str("stabilization");
        h.write_bool(self.enabled);
        if self.enabled {
            h.write_f64(self.strength);
            h.write_u32(self.smoothing_radius);
            h.write_u8(self.border as u8);
            self.estimator.hash_into(&mut h);
        }
        h.finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/stabilize/params.rs"]
mod tests;
