use rayon::prelude::*;

use crate::foundation::core::Point;
use crate::foundation::error::{FramelabError, FramelabResult};
use crate::motion::image::{Level, Pyramid};

/// Pyramidal Lucas–Kanade parameters.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LkParams {
    /// Half-size of the integration window (window side is `2 * window + 1`).
    pub window: u32,
    /// Pyramid levels above the base image.
    pub pyramid_levels: u32,
    /// Iteration cap per level.
    pub max_iterations: u32,
    /// Stop iterating once an update is shorter than this, in pixels.
    pub epsilon: f64,
    /// Tracks whose confidence falls below this are reported as lost.
    pub min_confidence: f64,
}

impl Default for LkParams {
    fn default() -> Self {
        Self {
            window: 7,
            pyramid_levels: 2,
            max_iterations: 10,
            epsilon: 0.03,
            min_confidence: 0.5,
        }
    }
}

impl LkParams {
    pub(crate) fn validate(&self) -> FramelabResult<()> {
        if self.window == 0 || self.window > 64 {
            return Err(FramelabError::validation("flow.window must be in [1, 64]"));
        }
        if self.pyramid_levels > 8 {
            return Err(FramelabError::validation("flow.pyramid_levels must be <= 8"));
        }
        if self.max_iterations == 0 {
            return Err(FramelabError::validation("flow.max_iterations must be > 0"));
        }
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(FramelabError::validation("flow.epsilon must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(FramelabError::validation(
                "flow.min_confidence must be in [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Tracking outcome for one point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct FlowResult {
    /// Position in the next image.
    pub(crate) position: Point,
    /// Converged, stayed inside the image and met `min_confidence`.
    pub(crate) found: bool,
    /// `1 - mean absolute residual / 64`, clamped to `[0, 1]`.
    pub(crate) confidence: f64,
}

/// Minimum normalized eigenvalue of the window's gradient matrix; below this the window has no
/// usable texture.
const MIN_EIG: f32 = 1e-4;

/// Track `points` from `prev` into `next`. Output order matches input order.
pub(crate) fn track_points(
    prev: &Pyramid,
    next: &Pyramid,
    points: &[Point],
    params: &LkParams,
) -> Vec<FlowResult> {
    points
        .par_iter()
        .map(|p| track_one(prev, next, *p, params))
        .collect()
}

fn track_one(prev: &Pyramid, next: &Pyramid, p: Point, params: &LkParams) -> FlowResult {
    let lost = FlowResult {
        position: p,
        found: false,
        confidence: 0.0,
    };
    let top = prev.levels.len().min(next.levels.len());
    if top == 0 {
        return lost;
    }

    let mut g = (0f32, 0f32);
    for level in (0..top).rev() {
        let scale = 1.0 / (1u32 << level) as f32;
        let px = p.x as f32 * scale;
        let py = p.y as f32 * scale;
        let Some(v) = refine_level(
            &prev.levels[level],
            &next.levels[level],
            (px, py),
            g,
            params,
        ) else {
            return lost;
        };
        g = if level > 0 {
            (2.0 * (g.0 + v.0), 2.0 * (g.1 + v.1))
        } else {
            (g.0 + v.0, g.1 + v.1)
        };
    }

    let base = next.base();
    let pos = Point::new(p.x + f64::from(g.0), p.y + f64::from(g.1));
    let inside = pos.x >= 0.0
        && pos.y >= 0.0
        && pos.x <= (base.width - 1) as f64
        && pos.y <= (base.height - 1) as f64;
    if !inside || !pos.x.is_finite() || !pos.y.is_finite() {
        return lost;
    }

    let residual = window_residual(&prev.levels[0], &next.levels[0], p, pos, params.window);
    let confidence = (1.0 - residual / 64.0).clamp(0.0, 1.0);
    FlowResult {
        position: pos,
        found: confidence >= params.min_confidence,
        confidence,
    }
}

/// Iterative LK on one level. Returns the residual displacement `v` on top of the guess `g`.
fn refine_level(
    prev: &Level,
    next: &Level,
    (px, py): (f32, f32),
    g: (f32, f32),
    params: &LkParams,
) -> Option<(f32, f32)> {
    let r = params.window as i32;
    let n = ((2 * r + 1) * (2 * r + 1)) as usize;
    let mut ix = Vec::with_capacity(n);
    let mut iy = Vec::with_capacity(n);
    let mut iv = Vec::with_capacity(n);
    let (mut gxx, mut gxy, mut gyy) = (0f32, 0f32, 0f32);
    for dy in -r..=r {
        for dx in -r..=r {
            let (x, y) = (px + dx as f32, py + dy as f32);
            let a = prev.gx.sample(x, y);
            let b = prev.gy.sample(x, y);
            gxx += a * a;
            gxy += a * b;
            gyy += b * b;
            ix.push(a);
            iy.push(b);
            iv.push(prev.image.sample(x, y));
        }
    }
    let det = gxx * gyy - gxy * gxy;
    let half_tr = 0.5 * (gxx + gyy);
    let min_eig = half_tr - (0.25 * (gxx - gyy) * (gxx - gyy) + gxy * gxy).sqrt();
    if min_eig / (n as f32) < MIN_EIG || det.abs() < f32::EPSILON {
        return None;
    }

    let eps2 = (params.epsilon * params.epsilon) as f32;
    let mut v = (0f32, 0f32);
    for _ in 0..params.max_iterations {
        let (mut bx, mut by) = (0f32, 0f32);
        let mut k = 0;
        for dy in -r..=r {
            for dx in -r..=r {
                let x = px + dx as f32 + g.0 + v.0;
                let y = py + dy as f32 + g.1 + v.1;
                let diff = iv[k] - next.image.sample(x, y);
                bx += diff * ix[k];
                by += diff * iy[k];
                k += 1;
            }
        }
        let ex = (gyy * bx - gxy * by) / det;
        let ey = (gxx * by - gxy * bx) / det;
        if !ex.is_finite() || !ey.is_finite() {
            return None;
        }
        v = (v.0 + ex, v.1 + ey);
        if ex * ex + ey * ey < eps2 {
            break;
        }
    }
    Some(v)
}

fn window_residual(prev: &Level, next: &Level, from: Point, to: Point, window: u32) -> f64 {
    let r = window as i32;
    let mut sum = 0f64;
    let mut n = 0u32;
    for dy in -r..=r {
        for dx in -r..=r {
            let a = prev
                .image
                .sample(from.x as f32 + dx as f32, from.y as f32 + dy as f32);
            let b = next
                .image
                .sample(to.x as f32 + dx as f32, to.y as f32 + dy as f32);
            sum += f64::from((a - b).abs());
            n += 1;
        }
    }
    sum / f64::from(n.max(1))
}

#[cfg(test)]
#[path = "../../tests/unit/motion/flow.rs"]
mod tests;
