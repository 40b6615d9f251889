use rayon::prelude::*;

use crate::foundation::core::Point;
use crate::foundation::error::{FramelabError, FramelabResult};
use crate::motion::image::GrayImage;

/// Block-matching parameters for the dense strategy.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DenseParams {
    /// Side of each square block, in pixels.
    pub block_size: u32,
    /// Largest displacement searched in each direction, in pixels.
    pub search_radius: u32,
    /// Blocks with lower intensity variance are skipped.
    pub min_texture: f64,
}

impl Default for DenseParams {
    fn default() -> Self {
        Self {
            block_size: 16,
            search_radius: 8,
            min_texture: 25.0,
        }
    }
}

impl DenseParams {
    pub(crate) fn validate(&self) -> FramelabResult<()> {
        if self.block_size < 4 {
            return Err(FramelabError::validation("dense.block_size must be >= 4"));
        }
        if self.search_radius == 0 || self.search_radius > 64 {
            return Err(FramelabError::validation(
                "dense.search_radius must be in [1, 64]",
            ));
        }
        if !(self.min_texture.is_finite() && self.min_texture >= 0.0) {
            return Err(FramelabError::validation(
                "dense.min_texture must be finite and >= 0",
            ));
        }
        Ok(())
    }
}

/// One correspondence per textured block: `(block center in prev, matched center in next)`.
///
/// Blocks are laid out on a grid that keeps the whole search area inside the image. Output is in
/// raster order regardless of scheduling.
pub(crate) fn block_correspondences(
    prev: &GrayImage,
    next: &GrayImage,
    params: &DenseParams,
) -> Vec<(Point, Point)> {
    let bs = params.block_size as usize;
    let sr = params.search_radius as usize;
    if prev.width != next.width || prev.height != next.height {
        return Vec::new();
    }
    if prev.width < bs + 2 * sr + 2 || prev.height < bs + 2 * sr + 2 {
        return Vec::new();
    }
    let mut origins = Vec::new();
    let mut y = sr + 1;
    while y + bs + sr < prev.height {
        let mut x = sr + 1;
        while x + bs + sr < prev.width {
            origins.push((x, y));
            x += bs;
        }
        y += bs;
    }

    origins
        .par_iter()
        .filter_map(|&(x, y)| match_block(prev, next, x, y, bs, sr as isize, params.min_texture))
        .collect()
}

fn match_block(
    prev: &GrayImage,
    next: &GrayImage,
    x0: usize,
    y0: usize,
    bs: usize,
    sr: isize,
    min_texture: f64,
) -> Option<(Point, Point)> {
    let w = prev.width;
    let mut sum = 0f64;
    let mut sum2 = 0f64;
    for y in y0..y0 + bs {
        for &v in &prev.data[y * w + x0..y * w + x0 + bs] {
            sum += f64::from(v);
            sum2 += f64::from(v) * f64::from(v);
        }
    }
    let n = (bs * bs) as f64;
    let variance = sum2 / n - (sum / n).powi(2);
    if variance < min_texture {
        return None;
    }

    let side = (2 * sr + 1) as usize;
    let mut costs = vec![f32::INFINITY; side * side];
    let mut best = (f32::INFINITY, 0isize, 0isize);
    for dy in -sr..=sr {
        for dx in -sr..=sr {
            let mut sad = 0f32;
            for y in 0..bs {
                let py = y0 + y;
                let ny = (py as isize + dy) as usize;
                let prow = &prev.data[py * w + x0..py * w + x0 + bs];
                let nstart = ny * w + (x0 as isize + dx) as usize;
                let nrow = &next.data[nstart..nstart + bs];
                sad += prow.iter().zip(nrow).map(|(a, b)| (a - b).abs()).sum::<f32>();
            }
            costs[((dy + sr) as usize) * side + (dx + sr) as usize] = sad;
            // Strictly smaller wins; among equals the shortest displacement is kept.
            let closer = dx * dx + dy * dy < best.1 * best.1 + best.2 * best.2;
            if sad < best.0 || (sad == best.0 && closer) {
                best = (sad, dx, dy);
            }
        }
    }

    let (_, bx, by) = best;
    let cost = |dx: isize, dy: isize| costs[((dy + sr) as usize) * side + (dx + sr) as usize];
    let sub_x = if bx > -sr && bx < sr {
        parabola_offset(cost(bx - 1, by), cost(bx, by), cost(bx + 1, by))
    } else {
        0.0
    };
    let sub_y = if by > -sr && by < sr {
        parabola_offset(cost(bx, by - 1), cost(bx, by), cost(bx, by + 1))
    } else {
        0.0
    };

    let half = (bs as f64 - 1.0) / 2.0;
    let from = Point::new(x0 as f64 + half, y0 as f64 + half);
    let to = Point::new(
        from.x + bx as f64 + sub_x,
        from.y + by as f64 + sub_y,
    );
    Some((from, to))
}

/// Vertex offset of the parabola through three equally spaced costs, in `[-0.5, 0.5]`.
fn parabola_offset(left: f32, mid: f32, right: f32) -> f64 {
    let denom = f64::from(left) - 2.0 * f64::from(mid) + f64::from(right);
    if denom.abs() < 1e-9 {
        return 0.0;
    }
    (0.5 * (f64::from(left) - f64::from(right)) / denom).clamp(-0.5, 0.5)
}

/// Component-wise median of the displacement vectors.
pub(crate) fn median_translation(pairs: &[(Point, Point)]) -> Option<(f64, f64)> {
    if pairs.is_empty() {
        return None;
    }
    let mut dx: Vec<f64> = pairs.iter().map(|(a, b)| b.x - a.x).collect();
    let mut dy: Vec<f64> = pairs.iter().map(|(a, b)| b.y - a.y).collect();
    Some((median(&mut dx), median(&mut dy)))
}

fn median(v: &mut [f64]) -> f64 {
    v.sort_by(f64::total_cmp);
    let mid = v.len() / 2;
    if v.len() % 2 == 0 {
        0.5 * (v[mid - 1] + v[mid])
    } else {
        v[mid]
    }
}

#[cfg(test)]
#[path = "../../tests/unit/motion/dense.rs"]
mod tests;
