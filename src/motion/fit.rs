use smallvec::SmallVec;

use crate::foundation::core::Point;
use crate::foundation::error::{FramelabError, FramelabResult};
use crate::foundation::math::{Mat3, Rng64};

type MinimalSet = SmallVec<[Point; 4]>;

/// Geometric model fitted to frame-to-frame correspondences.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionModel {
    /// 2 degrees of freedom.
    #[default]
    Translation,
    /// 6 degrees of freedom.
    Affine,
    /// 8 degrees of freedom.
    Homography,
}

impl MotionModel {
    /// Correspondences needed for a minimal fit.
    pub fn min_samples(self) -> usize {
        match self {
            Self::Translation => 1,
            Self::Affine => 3,
            Self::Homography => 4,
        }
    }
}

/// RANSAC settings.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RansacParams {
    /// Reprojection error (pixels) under which a correspondence counts as an inlier.
    pub threshold: f64,
    /// Hypotheses drawn per fit.
    pub iterations: u32,
    /// Fits supported by fewer than this fraction of correspondences are unreliable.
    pub min_inlier_ratio: f64,
    /// Seed of the sampling sequence; equal seeds give equal fits.
    pub seed: u64,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            threshold: 3.0,
            iterations: 256,
            min_inlier_ratio: 0.25,
            seed: 0x5EED,
        }
    }
}

impl RansacParams {
    pub(crate) fn validate(&self) -> FramelabResult<()> {
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(FramelabError::validation("ransac.threshold must be > 0"));
        }
        if self.iterations == 0 {
            return Err(FramelabError::validation("ransac.iterations must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.min_inlier_ratio) {
            return Err(FramelabError::validation(
                "ransac.min_inlier_ratio must be in [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Robust fit result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Fit {
    pub(crate) transform: Mat3,
    pub(crate) inliers: usize,
    pub(crate) inlier_ratio: f64,
}

/// RANSAC fit of `model` mapping `src[i]` onto `dst[i]`.
///
/// Returns `None` when there are too few correspondences or no non-degenerate hypothesis exists.
/// The winning hypothesis (most inliers, then lowest summed inlier error) is refit by least
/// squares on its inliers; the refit is kept only if it does not lose inliers.
pub(crate) fn ransac(
    model: MotionModel,
    src: &[Point],
    dst: &[Point],
    params: &RansacParams,
) -> Option<Fit> {
    let n = src.len().min(dst.len());
    let k = model.min_samples();
    if n < k {
        return None;
    }

    let mut rng = Rng64::new(params.seed);
    let mut idx = [0usize; 4];
    let mut scratch = Vec::with_capacity(n);
    let mut best: Option<(Mat3, usize, f64)> = None;
    for _ in 0..params.iterations {
        rng.sample_distinct(n, &mut idx[..k], &mut scratch);
        let s: MinimalSet = idx[..k].iter().map(|&i| src[i]).collect();
        let d: MinimalSet = idx[..k].iter().map(|&i| dst[i]).collect();
        let Some(m) = solve_minimal(model, &s, &d) else {
            continue;
        };
        let (count, err) = score(&m, src, dst, params.threshold);
        let better = match best {
            None => true,
            Some((_, bc, be)) => count > bc || (count == bc && err < be),
        };
        if better {
            best = Some((m, count, err));
        }
        if count == n && model == MotionModel::Translation {
            break;
        }
    }

    let (mut transform, mut inliers, _) = best?;
    let mask = inlier_mask(&transform, src, dst, params.threshold);
    let (si, di): (Vec<Point>, Vec<Point>) = mask
        .iter()
        .zip(src.iter().zip(dst))
        .filter(|(keep, _)| **keep)
        .map(|(_, (s, d))| (*s, *d))
        .unzip();
    if let Some(refit) = least_squares(model, &si, &di) {
        let (count, _) = score(&refit, src, dst, params.threshold);
        if count >= inliers {
            transform = refit;
            inliers = count;
        }
    }
    Some(Fit {
        transform,
        inliers,
        inlier_ratio: inliers as f64 / n as f64,
    })
}

fn reprojection_error(m: &Mat3, s: Point, d: Point) -> f64 {
    match m.apply(s) {
        Some(p) => ((p.x - d.x).powi(2) + (p.y - d.y).powi(2)).sqrt(),
        None => f64::INFINITY,
    }
}

fn score(m: &Mat3, src: &[Point], dst: &[Point], threshold: f64) -> (usize, f64) {
    let mut count = 0;
    let mut err = 0.0;
    for (s, d) in src.iter().zip(dst) {
        let e = reprojection_error(m, *s, *d);
        if e < threshold {
            count += 1;
            err += e;
        }
    }
    (count, err)
}

fn inlier_mask(m: &Mat3, src: &[Point], dst: &[Point], threshold: f64) -> Vec<bool> {
    src.iter()
        .zip(dst)
        .map(|(s, d)| reprojection_error(m, *s, *d) < threshold)
        .collect()
}

fn solve_minimal(model: MotionModel, s: &[Point], d: &[Point]) -> Option<Mat3> {
    match model {
        MotionModel::Translation => Some(Mat3::translation(d[0].x - s[0].x, d[0].y - s[0].y)),
        MotionModel::Affine => {
            if triangle_area(s[0], s[1], s[2]).abs() < 1e-3 {
                return None;
            }
            least_squares(model, s, d)
        }
        MotionModel::Homography => {
            for (a, b, c) in [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)] {
                if triangle_area(s[a], s[b], s[c]).abs() < 1e-3
                    || triangle_area(d[a], d[b], d[c]).abs() < 1e-3
                {
                    return None;
                }
            }
            least_squares(model, s, d)
        }
    }
}

fn triangle_area(a: Point, b: Point, c: Point) -> f64 {
    0.5 * ((b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y))
}

/// Least-squares fit over all given correspondences (exact for minimal sets).
pub(crate) fn least_squares(model: MotionModel, src: &[Point], dst: &[Point]) -> Option<Mat3> {
    let n = src.len().min(dst.len());
    if n < model.min_samples() {
        return None;
    }
    match model {
        MotionModel::Translation => {
            let (mut tx, mut ty) = (0.0, 0.0);
            for (s, d) in src.iter().zip(dst) {
                tx += d.x - s.x;
                ty += d.y - s.y;
            }
            Some(Mat3::translation(tx / n as f64, ty / n as f64))
        }
        MotionModel::Affine => {
            // Normal equations for [a b c] and [d e f] share the same 3x3 matrix.
            let mut ata = [0.0f64; 9];
            let mut atx = [0.0f64; 3];
            let mut aty = [0.0f64; 3];
            for (s, d) in src.iter().zip(dst) {
                let row = [s.x, s.y, 1.0];
                for r in 0..3 {
                    for c in 0..3 {
                        ata[r * 3 + c] += row[r] * row[c];
                    }
                    atx[r] += row[r] * d.x;
                    aty[r] += row[r] * d.y;
                }
            }
            let mut a1 = ata;
            let p = solve_linear(&mut a1, &mut atx, 3)?;
            let mut a2 = ata;
            let q = solve_linear(&mut a2, &mut aty, 3)?;
            Some(Mat3::affine(p[0], p[1], p[2], q[0], q[1], q[2]))
        }
        MotionModel::Homography => homography_dlt(&src[..n], &dst[..n]),
    }
}

/// Normalized DLT with `h33 = 1`, solved through the 8x8 normal equations.
fn homography_dlt(src: &[Point], dst: &[Point]) -> Option<Mat3> {
    let ts = normalizer(src)?;
    let td = normalizer(dst)?;
    let mut ata = [0.0f64; 64];
    let mut atb = [0.0f64; 8];
    for (s, d) in src.iter().zip(dst) {
        let s = ts.apply(*s)?;
        let d = td.apply(*d)?;
        let rows = [
            ([s.x, s.y, 1.0, 0.0, 0.0, 0.0, -s.x * d.x, -s.y * d.x], d.x),
            ([0.0, 0.0, 0.0, s.x, s.y, 1.0, -s.x * d.y, -s.y * d.y], d.y),
        ];
        for (row, rhs) in rows {
            for r in 0..8 {
                for c in 0..8 {
                    ata[r * 8 + c] += row[r] * row[c];
                }
                atb[r] += row[r] * rhs;
            }
        }
    }
    let h = solve_linear(&mut ata, &mut atb, 8)?;
    let hn = Mat3([[h[0], h[1], h[2]], [h[3], h[4], h[5]], [h[6], h[7], 1.0]]);
    let m = td.inverse()?.compose(&hn).compose(&ts).normalized();
    m.is_finite().then_some(m)
}

/// Similarity moving the centroid to the origin and the mean distance to `sqrt(2)`.
fn normalizer(pts: &[Point]) -> Option<Mat3> {
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p.y).sum::<f64>() / n;
    let mean_d = pts
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if mean_d < 1e-9 {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_d;
    Some(Mat3::affine(s, 0.0, -s * cx, 0.0, s, -s * cy))
}

/// Gaussian elimination with partial pivoting on a row-major `n x n` system.
fn solve_linear(a: &mut [f64], b: &mut [f64], n: usize) -> Option<Vec<f64>> {
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i * n + col].abs().total_cmp(&a[j * n + col].abs()))?;
        if a[pivot * n + col].abs() < 1e-12 {
            return None;
        }
        if pivot != col {
            for c in 0..n {
                a.swap(col * n + c, pivot * n + c);
            }
            b.swap(col, pivot);
        }
        for row in col + 1..n {
            let f = a[row * n + col] / a[col * n + col];
            if f == 0.0 {
                continue;
            }
            for c in col..n {
                a[row * n + c] -= f * a[col * n + c];
            }
            b[row] -= f * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut acc = b[row];
        for c in row + 1..n {
            acc -= a[row * n + c] * x[c];
        }
        x[row] = acc / a[row * n + row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

#[cfg(test)]
#[path = "../../tests/unit/motion/fit.rs"]
mod tests;
