use crate::fingerprint::{Fingerprint, StableHasher};
use crate::foundation::core::{FrameIndex, FrameRange, Point, Vec2};
use crate::foundation::diagnostic::{Diagnostic, Stage};
use crate::foundation::error::{FramelabError, FramelabResult};
use crate::foundation::frame::Frame;
use crate::foundation::math::Mat3;
use crate::stabilize::warp::warp_frame;
use crate::stabilize::{BorderPolicy, StabilizationParams, Trajectory};

/// Axis-aligned output rectangle in stabilized source coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CropRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width (even).
    pub width: u32,
    /// Height (even).
    pub height: u32,
}

/// Per-job stabilization result: one corrective transform per frame plus the border treatment.
///
/// Built once after the analysis pass and shared read-only by process workers.
#[derive(Clone, Debug, PartialEq)]
pub struct StabilizationPlan {
    range: FrameRange,
    source_size: (u32, u32),
    corrections: Vec<Mat3>,
    residual: Vec<Mat3>,
    crop: Option<CropRect>,
    border: BorderPolicy,
    fingerprint: Fingerprint,
    diagnostics: Vec<Diagnostic>,
}

impl StabilizationPlan {
    /// Derive corrections `C_k = S_k · P_k⁻¹` from `trajectory`, blend them by strength and
    /// resolve the border policy for `width x height` source frames.
    #[tracing::instrument(level = "debug", skip_all, fields(frames = trajectory.len()))]
    pub fn build(
        trajectory: &Trajectory,
        params: &StabilizationParams,
        width: u32,
        height: u32,
    ) -> FramelabResult<Self> {
        params.validate()?;
        if width == 0 || height == 0 {
            return Err(FramelabError::validation("stabilization needs a non-empty frame size"));
        }
        let smoothed = trajectory.smooth(params.smoothing_radius);
        let t = params.strength / 100.0;
        let mut corrections = Vec::with_capacity(trajectory.len());
        let mut residual = Vec::with_capacity(trajectory.len());
        let mut diagnostics = Vec::new();
        for (k, (pose, smooth)) in trajectory.poses().iter().zip(&smoothed).enumerate() {
            let full = match pose.inverse() {
                Some(inv) => smooth.compose(&inv).normalized(),
                None => {
                    let frame = FrameIndex(trajectory.start().0 + k as u64);
                    diagnostics.push(Diagnostic::new(
                        Stage::Analyze,
                        Some(frame),
                        "singular camera pose, correction set to identity",
                    ));
                    Mat3::IDENTITY
                }
            };
            let c = if t == 0.0 {
                Mat3::IDENTITY
            } else if t == 1.0 {
                full
            } else {
                Mat3::lerp(&Mat3::IDENTITY, &full, t)
            };
            residual.push(c.compose(pose).normalized());
            corrections.push(c);
        }

        let mut border = params.border;
        let mut crop = None;
        if border == BorderPolicy::Crop && corrections.iter().any(|c| !c.is_identity()) {
            crop = common_valid_rect(&corrections, width, height);
            if crop.is_none() {
                let msg = "corrections leave no common valid area, using replicate borders";
                tracing::warn!("{msg}");
                diagnostics.push(Diagnostic::new(Stage::Analyze, None, msg));
                border = BorderPolicy::Replicate;
            }
        }

        let range = trajectory.range();
        let mut h = StableHasher::new();
        let pf = params.fingerprint();
        h.write_u64(pf.hi);
        h.write_u64(pf.lo);
        h.write_u64(range.start.0);
        h.write_u64(range.end.0);
        h.write_u32(width);
        h.write_u32(height);

        tracing::debug!(
            unreliable = trajectory.unreliable_count(),
            crop = ?crop,
            "stabilization plan ready"
        );
        Ok(Self {
            range,
            source_size: (width, height),
            corrections,
            residual,
            crop,
            border,
            fingerprint: h.finish(),
            diagnostics,
        })
    }

    /// Frames covered.
    pub fn range(&self) -> FrameRange {
        self.range
    }

    /// Blended corrections in frame order.
    pub fn corrections(&self) -> &[Mat3] {
        &self.corrections
    }

    /// Correction of `frame`, if covered.
    pub fn correction(&self, frame: FrameIndex) -> Option<&Mat3> {
        self.corrections.get(self.range.offset_of(frame)?)
    }

    /// `C_k · P_k` per frame: the camera path left after correction.
    pub fn residual_trajectory(&self) -> &[Mat3] {
        &self.residual
    }

    /// Common crop rectangle when the crop policy is active.
    pub fn crop(&self) -> Option<CropRect> {
        self.crop
    }

    /// Effective border policy (crop falls back to replicate when no valid area remains).
    pub fn border(&self) -> BorderPolicy {
        self.border
    }

    /// Cache-key component covering parameters, range and source size.
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Non-fatal conditions met while building the plan.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Output size for source-sized frames.
    pub fn output_size(&self) -> (u32, u32) {
        self.output_size_for(self.source_size.0, self.source_size.1, Vec2::ZERO)
    }

    /// Output size for `width x height` frames whose origin sits at `origin` in source
    /// coordinates (after a geometry-changing effect stack).
    pub fn output_size_for(&self, width: u32, height: u32, origin: Vec2) -> (u32, u32) {
        match self.local_crop(width, height, origin) {
            Some(r) => (r.width, r.height),
            None => (width, height),
        }
    }

    fn local_crop(&self, width: u32, height: u32, origin: Vec2) -> Option<CropRect> {
        let r = self.crop?;
        let x0 = (f64::from(r.x) - origin.x).max(0.0);
        let y0 = (f64::from(r.y) - origin.y).max(0.0);
        let x1 = (f64::from(r.x + r.width) - origin.x).min(f64::from(width));
        let y1 = (f64::from(r.y + r.height) - origin.y).min(f64::from(height));
        even_rect(x0.ceil(), y0.ceil(), x1.floor(), y1.floor())
    }

    /// Apply the correction of `frame.index()`.
    ///
    /// `origin` is where the frame's top-left pixel sits in source coordinates; the correction is
    /// conjugated accordingly. Identity corrections without a crop return the frame unchanged.
    pub fn apply(&self, frame: &Frame, origin: Vec2) -> FramelabResult<Frame> {
        let c = self.correction(frame.index()).ok_or_else(|| {
            FramelabError::validation(format!(
                "frame {} is outside the stabilized range",
                frame.index().0
            ))
        })?;
        let crop = self.local_crop(frame.width(), frame.height(), origin);
        if c.is_identity() && crop.is_none() {
            return Ok(frame.clone());
        }
        let shift = Mat3::translation(origin.x, origin.y);
        let unshift = Mat3::translation(-origin.x, -origin.y);
        let inverse = c
            .inverse()
            .ok_or_else(|| FramelabError::motion("correction is not invertible"))?;
        let local = unshift.compose(&inverse).compose(&shift);
        let (w, h, offset) = match crop {
            Some(r) => (r.width, r.height, (r.x, r.y)),
            None => (frame.width(), frame.height(), (0, 0)),
        };
        warp_frame(frame, &local, w, h, offset, self.border)
    }
}

/// Intersection over all frames of the axis-aligned box inside each corrected frame.
fn common_valid_rect(corrections: &[Mat3], width: u32, height: u32) -> Option<CropRect> {
    let (wm, hm) = (f64::from(width - 1), f64::from(height - 1));
    let (mut left, mut top, mut right, mut bottom) = (0.0f64, 0.0f64, wm, hm);
    for c in corrections {
        let tl = c.apply(Point::new(0.0, 0.0))?;
        let tr = c.apply(Point::new(wm, 0.0))?;
        let bl = c.apply(Point::new(0.0, hm))?;
        let br = c.apply(Point::new(wm, hm))?;
        left = left.max(tl.x).max(bl.x);
        right = right.min(tr.x).min(br.x);
        top = top.max(tl.y).max(tr.y);
        bottom = bottom.min(bl.y).min(br.y);
    }
    // Pixel centers in [left, right] are valid; the rectangle spans them inclusively.
    const EPS: f64 = 1e-9;
    even_rect(
        (left - EPS).ceil(),
        (top - EPS).ceil(),
        (right + EPS).floor() + 1.0,
        (bottom + EPS).floor() + 1.0,
    )
}

/// Half-open `[x0, x1) x [y0, y1)` trimmed to even dimensions; `None` below 2x2.
fn even_rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Option<CropRect> {
    if !(x0.is_finite() && y0.is_finite() && x1.is_finite() && y1.is_finite()) {
        return None;
    }
    let w = (x1 - x0).max(0.0) as u32;
    let h = (y1 - y0).max(0.0) as u32;
    let (w, h) = (w & !1, h & !1);
    if w < 2 || h < 2 || x0 < 0.0 || y0 < 0.0 {
        return None;
    }
    Some(CropRect {
        x: x0 as u32,
        y: y0 as u32,
        width: w,
        height: h,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/stabilize/plan.rs"]
mod tests;
