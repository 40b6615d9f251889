use rayon::prelude::*;

use crate::foundation::error::FramelabResult;
use crate::foundation::frame::Frame;
use crate::foundation::math::{Mat3, saturate_u8};
use crate::stabilize::BorderPolicy;

/// Resample `frame` into a `width x height` output.
///
/// Output pixel `(x, y)` reads the source at `inverse · (x + offset.0, y + offset.1)` with
/// bilinear filtering. Samples falling outside the source follow `border`: `Mirror` reflects,
/// everything else clamps to the edge.
pub(crate) fn warp_frame(
    frame: &Frame,
    inverse: &Mat3,
    width: u32,
    height: u32,
    offset: (u32, u32),
    border: BorderPolicy,
) -> FramelabResult<Frame> {
    let c = frame.format().channels();
    let (sw, sh) = (frame.width() as i64, frame.height() as i64);
    let src = frame.data();
    let row_len = width as usize * c;
    let mut out = vec![0u8; row_len * height as usize];
    let m = inverse.0;

    out.par_chunks_mut(row_len.max(1))
        .enumerate()
        .for_each(|(y, row)| {
            let yf = (y as u32 + offset.1) as f64;
            for x in 0..width as usize {
                let xf = (x as u32 + offset.0) as f64;
                let w = m[2][0] * xf + m[2][1] * yf + m[2][2];
                let (sx, sy) = if w.abs() < 1e-12 {
                    (-1.0, -1.0)
                } else {
                    (
                        (m[0][0] * xf + m[0][1] * yf + m[0][2]) / w,
                        (m[1][0] * xf + m[1][1] * yf + m[1][2]) / w,
                    )
                };
                let px = &mut row[x * c..x * c + c];
                sample_bilinear(src, sw, sh, c, sx, sy, border, px);
            }
        });

    frame.derive(width, height, out)
}

fn resolve(i: i64, n: i64, border: BorderPolicy) -> usize {
    let v = match border {
        BorderPolicy::Mirror if n > 1 => {
            let period = 2 * (n - 1);
            let m = i.rem_euclid(period);
            if m < n { m } else { period - m }
        }
        _ => i.clamp(0, n - 1),
    };
    v as usize
}

#[allow(clippy::too_many_arguments)]
fn sample_bilinear(
    src: &[u8],
    w: i64,
    h: i64,
    c: usize,
    x: f64,
    y: f64,
    border: BorderPolicy,
    out: &mut [u8],
) {
    if !x.is_finite() || !y.is_finite() {
        out.fill(0);
        return;
    }
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (xi, yi) = (x0 as i64, y0 as i64);
    let (xa, xb) = (resolve(xi, w, border), resolve(xi + 1, w, border));
    let (ya, yb) = (resolve(yi, h, border), resolve(yi + 1, h, border));
    let stride = w as usize * c;
    let at = |xx: usize, yy: usize, ch: usize| f64::from(src[yy * stride + xx * c + ch]);
    for (ch, o) in out.iter_mut().enumerate() {
        if fx == 0.0 && fy == 0.0 {
            *o = src[ya * stride + xa * c + ch];
            continue;
        }
        let top = at(xa, ya, ch) + (at(xb, ya, ch) - at(xa, ya, ch)) * fx;
        let bottom = at(xa, yb, ch) + (at(xb, yb, ch) - at(xa, yb, ch)) * fx;
        *o = saturate_u8(top + (bottom - top) * fy);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/stabilize/warp.rs"]
mod tests;
