use crate::fingerprint::StableHasher;
use crate::foundation::core::{FrameIndex, Point};
use crate::foundation::error::{FramelabError, FramelabResult};
use crate::foundation::frame::Frame;
use crate::foundation::math::Mat3;
use crate::motion::dense::{self, DenseParams};
use crate::motion::features::{self, FeatureParams};
use crate::motion::fit::{self, MotionModel, RansacParams};
use crate::motion::flow::{self, LkParams};
use crate::motion::image::{GrayImage, Pyramid};

/// How correspondences between two frames are found.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Corners tracked with pyramidal Lucas–Kanade.
    #[default]
    Sparse,
    /// Block matching on a regular grid.
    Dense,
}

/// Complete motion estimation configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EstimatorParams {
    /// Correspondence strategy.
    pub strategy: Strategy,
    /// Model fitted to the correspondences.
    pub model: MotionModel,
    /// Corner detection (sparse strategy).
    pub features: FeatureParams,
    /// Optical flow (sparse strategy).
    pub flow: LkParams,
    /// Block matching (dense strategy).
    pub dense: DenseParams,
    /// Robust fitting.
    pub ransac: RansacParams,
}

impl EstimatorParams {
    /// Check every numeric setting.
    pub fn validate(&self) -> FramelabResult<()> {
        self.features.validate()?;
        self.flow.validate()?;
        self.dense.validate()?;
        self.ransac.validate()
    }

    pub(crate) fn hash_into(&self, h: &mut StableHasher) {
        h.write_u8(self.strategy as u8);
        h.write_u8(self.model as u8);
        h.write_u64(self.features.max_corners as u64);
        h.write_f64(self.features.quality_level);
        h.write_f64(self.features.min_distance);
        h.write_u32(self.features.block_size);
        h.write_u32(self.flow.window);
        h.write_u32(self.flow.pyramid_levels);
        h.write_u32(self.flow.max_iterations);
        h.write_f64(self.flow.epsilon);
        h.write_f64(self.flow.min_confidence);
        h.write_u32(self.dense.block_size);
        h.write_u32(self.dense.search_radius);
        h.write_f64(self.dense.min_texture);
        h.write_f64(self.ransac.threshold);
        h.write_u32(self.ransac.iterations);
        h.write_f64(self.ransac.min_inlier_ratio);
        h.write_u64(self.ransac.seed);
    }
}

/// Estimated motion between two frames.
///
/// `transform` maps pixel coordinates of frame `from` onto frame `to`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MotionSample {
    /// Earlier frame.
    pub from: FrameIndex,
    /// Later frame.
    pub to: FrameIndex,
    /// `from` → `to` coordinate transform.
    pub transform: Mat3,
    /// Model the transform was fitted with.
    pub model: MotionModel,
    /// Fraction of correspondences consistent with `transform`.
    pub inlier_ratio: f64,
    /// `false` when the estimate fell back to identity.
    pub reliable: bool,
}

impl MotionSample {
    /// Identity motion flagged unreliable.
    pub fn identity(from: FrameIndex, to: FrameIndex, model: MotionModel) -> Self {
        Self {
            from,
            to,
            transform: Mat3::IDENTITY,
            model,
            inlier_ratio: 0.0,
            reliable: false,
        }
    }
}

/// Frame converted once for estimation (luma pyramid with gradients).
#[derive(Clone, Debug)]
pub struct PreparedFrame {
    index: FrameIndex,
    pyramid: Pyramid,
}

impl PreparedFrame {
    /// Source frame index.
    pub fn index(&self) -> FrameIndex {
        self.index
    }

    pub(crate) fn pyramid(&self) -> &Pyramid {
        &self.pyramid
    }

    pub(crate) fn size(&self) -> (usize, usize) {
        let b = self.pyramid.base();
        (b.width, b.height)
    }
}

/// Frame-to-frame motion estimator.
#[derive(Clone, Debug)]
pub struct MotionEstimator {
    params: EstimatorParams,
}

impl MotionEstimator {
    /// Estimator with the given (validated) settings.
    pub fn new(params: EstimatorParams) -> FramelabResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Active settings.
    pub fn params(&self) -> &EstimatorParams {
        &self.params
    }

    /// Build the luma pyramid of `frame`.
    pub fn prepare(&self, frame: &Frame) -> PreparedFrame {
        PreparedFrame {
            index: frame.index(),
            pyramid: Pyramid::build(GrayImage::from_frame(frame), self.params.flow.pyramid_levels),
        }
    }

    /// Motion from `prev` to `next`. Always returns a sample; degenerate input yields identity.
    pub fn estimate(&self, prev: &Frame, next: &Frame) -> MotionSample {
        self.estimate_prepared(&self.prepare(prev), &self.prepare(next))
    }

    /// Sample for a pair whose frames are unavailable (decode gaps).
    pub fn estimate_missing(&self, from: FrameIndex, to: FrameIndex) -> MotionSample {
        MotionSample::identity(from, to, self.params.model)
    }

    /// [`MotionEstimator::estimate`] on frames already prepared.
    #[tracing::instrument(level = "debug", skip_all, fields(from = prev.index.0, to = next.index.0))]
    pub fn estimate_prepared(&self, prev: &PreparedFrame, next: &PreparedFrame) -> MotionSample {
        let model = self.params.model;
        let fallback = MotionSample::identity(prev.index, next.index, model);
        if prev.size() != next.size() {
            tracing::warn!(
                from = prev.index.0,
                to = next.index.0,
                "frame size changed between frames, motion set to identity"
            );
            return fallback;
        }

        let (src, dst) = match self.correspondences(prev, next) {
            Ok(pairs) => pairs,
            Err(e) => {
                tracing::debug!("no usable correspondences: {e}");
                return fallback;
            }
        };

        let fitted = match (self.params.strategy, model) {
            (Strategy::Dense, MotionModel::Translation) => {
                let pairs: Vec<(Point, Point)> = src.iter().copied().zip(dst.iter().copied()).collect();
                dense::median_translation(&pairs).map(|(tx, ty)| {
                    let thr = self.params.ransac.threshold;
                    let inliers = pairs
                        .iter()
                        .filter(|(a, b)| {
                            ((b.x - a.x - tx).powi(2) + (b.y - a.y - ty).powi(2)).sqrt() < thr
                        })
                        .count();
                    (Mat3::translation(tx, ty), inliers as f64 / pairs.len() as f64)
                })
            }
            _ => fit::ransac(model, &src, &dst, &self.params.ransac)
                .map(|f| (f.transform, f.inlier_ratio)),
        };

        let Some((transform, inlier_ratio)) = fitted else {
            tracing::debug!(pairs = src.len(), "degenerate fit, motion set to identity");
            return fallback;
        };
        if inlier_ratio < self.params.ransac.min_inlier_ratio
            || !transform.is_finite()
            || transform.inverse().is_none()
        {
            tracing::debug!(inlier_ratio, "fit rejected, motion set to identity");
            return MotionSample {
                inlier_ratio,
                ..fallback
            };
        }
        tracing::debug!(pairs = src.len(), inlier_ratio, "motion estimated");
        MotionSample {
            from: prev.index,
            to: next.index,
            transform,
            model,
            inlier_ratio,
            reliable: true,
        }
    }

    fn correspondences(
        &self,
        prev: &PreparedFrame,
        next: &PreparedFrame,
    ) -> FramelabResult<(Vec<Point>, Vec<Point>)> {
        let (src, dst): (Vec<Point>, Vec<Point>) = match self.params.strategy {
            Strategy::Sparse => {
                let corners =
                    features::detect_corners(&prev.pyramid.levels[0], &self.params.features, &[]);
                let tracked =
                    flow::track_points(&prev.pyramid, &next.pyramid, &corners, &self.params.flow);
                corners
                    .iter()
                    .zip(&tracked)
                    .filter(|(_, t)| t.found)
                    .map(|(c, t)| (*c, t.position))
                    .unzip()
            }
            Strategy::Dense => {
                dense::block_correspondences(prev.pyramid.base(), next.pyramid.base(), &self.params.dense)
                    .into_iter()
                    .unzip()
            }
        };
        if src.len() < self.params.model.min_samples() {
            return Err(FramelabError::motion(format!(
                "{} correspondences, {} needed",
                src.len(),
                self.params.model.min_samples()
            )));
        }
        Ok((src, dst))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/motion/estimator.rs"]
mod tests;
