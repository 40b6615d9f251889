use crate::effects::color::replicate_luma;
use crate::effects::params::EffectParams;
use crate::effects::registry::EffectOp;
use crate::foundation::error::{FramelabError, FramelabResult};
use crate::foundation::frame::Frame;

/// `edge_detect`: Canny edge map on luma with `low`/`high` hysteresis thresholds.
pub(crate) struct EdgeDetect;

impl EffectOp for EdgeDetect {
    fn apply(&self, frame: &Frame, params: &EffectParams<'_>) -> FramelabResult<Frame> {
        let low = params.number_in("low", Some(50.0), 0.0, 255.0)?;
        let high = params.number_in("high", Some(150.0), 0.0, 255.0)?;
        if low > high {
            return Err(FramelabError::validation(format!(
                "edge_detect: low threshold {low} exceeds high threshold {high}"
            )));
        }
        let edges = canny(&frame.luma(), frame.width(), frame.height(), low, high);
        replicate_luma(frame, &edges)
    }
}

/// Canny edge detector: Sobel gradients (L1 magnitude), non-maximum suppression and hysteresis.
///
/// Returns a plane with 255 on edge pixels and 0 elsewhere.
pub(crate) fn canny(luma: &[u8], width: u32, height: u32, low: f64, high: f64) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let at = |x: isize, y: isize| -> i32 {
        let cx = x.clamp(0, w as isize - 1) as usize;
        let cy = y.clamp(0, h as isize - 1) as usize;
        i32::from(luma[cy * w + cx])
    };

    let mut gx = vec![0i32; w * h];
    let mut gy = vec![0i32; w * h];
    let mut mag = vec![0i32; w * h];
    for y in 0..h as isize {
        for x in 0..w as isize {
            let dx = (at(x + 1, y - 1) + 2 * at(x + 1, y) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2 * at(x - 1, y) + at(x - 1, y + 1));
            let dy = (at(x - 1, y + 1) + 2 * at(x, y + 1) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2 * at(x, y - 1) + at(x + 1, y - 1));
            let i = y as usize * w + x as usize;
            gx[i] = dx;
            gy[i] = dy;
            mag[i] = dx.abs() + dy.abs();
        }
    }

    let m = |x: isize, y: isize| -> i32 {
        if x < 0 || y < 0 || x >= w as isize || y >= h as isize {
            0
        } else {
            mag[y as usize * w + x as usize]
        }
    };

    // 0 = suppressed, 1 = weak candidate, 2 = strong.
    let mut class = vec![0u8; w * h];
    let mut stack = Vec::new();
    for y in 0..h as isize {
        for x in 0..w as isize {
            let i = y as usize * w + x as usize;
            let v = mag[i];
            if f64::from(v) <= low {
                continue;
            }
            let (ax, ay) = (i64::from(gx[i].abs()), i64::from(gy[i].abs()));
            // tan(22.5°) ≈ 0.4142, tan(67.5°) ≈ 2.4142
            let (n1, n2) = if ay * 10_000 < ax * 4_142 {
                (m(x - 1, y), m(x + 1, y))
            } else if ay * 10_000 > ax * 24_142 {
                (m(x, y - 1), m(x, y + 1))
            } else if (gx[i] > 0) == (gy[i] > 0) {
                (m(x - 1, y - 1), m(x + 1, y + 1))
            } else {
                (m(x + 1, y - 1), m(x - 1, y + 1))
            };
            if v > n1 && v >= n2 {
                if f64::from(v) > high {
                    class[i] = 2;
                    stack.push(i);
                } else {
                    class[i] = 1;
                }
            }
        }
    }

    let mut out = vec![0u8; w * h];
    for &i in &stack {
        out[i] = 255;
    }
    while let Some(i) = stack.pop() {
        let (x, y) = ((i % w) as isize, (i / w) as isize);
        for ny in y - 1..=y + 1 {
            for nx in x - 1..=x + 1 {
                if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                    continue;
                }
                let j = ny as usize * w + nx as usize;
                if class[j] == 1 && out[j] == 0 {
                    out[j] = 255;
                    stack.push(j);
                }
            }
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/effects/edges.rs"]
mod tests;
