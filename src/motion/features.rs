use crate::foundation::core::Point;
use crate::foundation::error::{FramelabError, FramelabResult};
use crate::motion::image::Level;

/// Shi–Tomasi corner detection parameters.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FeatureParams {
    /// Maximum number of corners returned.
    pub max_corners: usize,
    /// Corners weaker than `quality_level * strongest` are dropped.
    pub quality_level: f64,
    /// Minimum euclidean distance between returned corners, in pixels.
    pub min_distance: f64,
    /// Side of the window the structure tensor is summed over.
    pub block_size: u32,
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            max_corners: 100,
            quality_level: 0.01,
            min_distance: 7.0,
            block_size: 7,
        }
    }
}

impl FeatureParams {
    pub(crate) fn validate(&self) -> FramelabResult<()> {
        if self.max_corners == 0 {
            return Err(FramelabError::validation("features.max_corners must be > 0"));
        }
        if !(self.quality_level > 0.0 && self.quality_level <= 1.0) {
            return Err(FramelabError::validation(
                "features.quality_level must be in (0, 1]",
            ));
        }
        if !self.min_distance.is_finite() || self.min_distance < 0.0 {
            return Err(FramelabError::validation(
                "features.min_distance must be finite and >= 0",
            ));
        }
        if self.block_size < 3 || self.block_size.is_multiple_of(2) {
            return Err(FramelabError::validation(
                "features.block_size must be odd and >= 3",
            ));
        }
        Ok(())
    }
}

/// Detect corners on `level`, strongest first.
///
/// Candidates closer than `min_distance` to any point in `existing` are skipped, so the tracker can
/// replenish without duplicating live tracks.
pub(crate) fn detect_corners(level: &Level, params: &FeatureParams, existing: &[Point]) -> Vec<Point> {
    let w = level.image.width;
    let h = level.image.height;
    let r = (params.block_size / 2) as usize;
    if w <= 2 * r + 2 || h <= 2 * r + 2 {
        return Vec::new();
    }

    let gx = &level.gx.data;
    let gy = &level.gy.data;
    let mut ixx = vec![0f32; w * h];
    let mut iyy = vec![0f32; w * h];
    let mut ixy = vec![0f32; w * h];
    for i in 0..w * h {
        ixx[i] = gx[i] * gx[i];
        iyy[i] = gy[i] * gy[i];
        ixy[i] = gx[i] * gy[i];
    }
    let sxx = box_sum(&ixx, w, h, r);
    let syy = box_sum(&iyy, w, h, r);
    let sxy = box_sum(&ixy, w, h, r);

    let mut response = vec![0f32; w * h];
    let mut max_resp = 0f32;
    let margin = r + 1;
    for y in margin..h - margin {
        for x in margin..w - margin {
            let i = y * w + x;
            let a = sxx[i];
            let c = syy[i];
            let b = sxy[i];
            let half_tr = 0.5 * (a + c);
            let det_term = (0.25 * (a - c) * (a - c) + b * b).sqrt();
            let min_eig = half_tr - det_term;
            response[i] = min_eig;
            max_resp = max_resp.max(min_eig);
        }
    }
    if max_resp <= 0.0 {
        return Vec::new();
    }

    let threshold = (params.quality_level as f32) * max_resp;
    let mut candidates = Vec::new();
    for y in margin..h - margin {
        for x in margin..w - margin {
            let v = response[y * w + x];
            if v < threshold || v <= 0.0 {
                continue;
            }
            let is_local_max = (y - 1..=y + 1)
                .all(|ny| (x - 1..=x + 1).all(|nx| response[ny * w + nx] <= v));
            if is_local_max {
                candidates.push((v, x, y));
            }
        }
    }
    // Strongest first; ties resolved in raster order for determinism.
    candidates.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then(a.2.cmp(&b.2))
            .then(a.1.cmp(&b.1))
    });

    let min_d2 = params.min_distance * params.min_distance;
    let mut picked: Vec<Point> = Vec::new();
    for (_, x, y) in candidates {
        if picked.len() >= params.max_corners {
            break;
        }
        let p = Point::new(x as f64, y as f64);
        let far = |q: &Point| (q.x - p.x).powi(2) + (q.y - p.y).powi(2) >= min_d2;
        if picked.iter().all(far) && existing.iter().all(far) {
            picked.push(p);
        }
    }
    picked
}

/// Sum over the `(2r+1)^2` window around every pixel (clamped at the borders).
fn box_sum(src: &[f32], w: usize, h: usize, r: usize) -> Vec<f32> {
    let mut tmp = vec![0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            let lo = x.saturating_sub(r);
            let hi = (x + r).min(w - 1);
            tmp[y * w + x] = src[y * w + lo..=y * w + hi].iter().sum();
        }
    }
    let mut out = vec![0f32; w * h];
    for y in 0..h {
        let lo = y.saturating_sub(r);
        let hi = (y + r).min(h - 1);
        for x in 0..w {
            out[y * w + x] = (lo..=hi).map(|yy| tmp[yy * w + x]).sum();
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/motion/features.rs"]
mod tests;
