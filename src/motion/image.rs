use crate::foundation::frame::Frame;

/// Single-channel `f32` image used by the motion estimators.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct GrayImage {
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) data: Vec<f32>,
}

impl GrayImage {
    pub(crate) fn from_luma(luma: &[u8], width: usize, height: usize) -> Self {
        debug_assert_eq!(luma.len(), width * height);
        Self {
            width,
            height,
            data: luma.iter().map(|&v| f32::from(v)).collect(),
        }
    }

    pub(crate) fn from_frame(frame: &Frame) -> Self {
        Self::from_luma(
            &frame.luma(),
            frame.width() as usize,
            frame.height() as usize,
        )
    }

    /// Pixel with coordinates clamped to the image.
    #[inline]
    pub(crate) fn at(&self, x: isize, y: isize) -> f32 {
        let cx = x.clamp(0, self.width as isize - 1) as usize;
        let cy = y.clamp(0, self.height as isize - 1) as usize;
        self.data[cy * self.width + cx]
    }

    /// Bilinear sample with clamped borders.
    #[inline]
    pub(crate) fn sample(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (xi, yi) = (x0 as isize, y0 as isize);
        let a = self.at(xi, yi);
        let b = self.at(xi + 1, yi);
        let c = self.at(xi, yi + 1);
        let d = self.at(xi + 1, yi + 1);
        let top = a + (b - a) * fx;
        let bottom = c + (d - c) * fx;
        top + (bottom - top) * fy
    }

    /// Half-resolution image after a `[1 4 6 4 1] / 16` binomial blur.
    pub(crate) fn pyr_down(&self) -> Self {
        const K: [f32; 5] = [1.0 / 16.0, 4.0 / 16.0, 6.0 / 16.0, 4.0 / 16.0, 1.0 / 16.0];
        let w = self.width;
        let h = self.height;
        let mut tmp = vec![0f32; w * h];
        for y in 0..h {
            for x in 0..w {
                let mut acc = 0.0;
                for (i, k) in K.iter().enumerate() {
                    acc += k * self.at(x as isize + i as isize - 2, y as isize);
                }
                tmp[y * w + x] = acc;
            }
        }
        let blurred = Self {
            width: w,
            height: h,
            data: tmp,
        };
        let ow = w.div_ceil(2).max(1);
        let oh = h.div_ceil(2).max(1);
        let mut out = vec![0f32; ow * oh];
        for oy in 0..oh {
            for ox in 0..ow {
                let (x, y) = (2 * ox as isize, 2 * oy as isize);
                let mut acc = 0.0;
                for (i, k) in K.iter().enumerate() {
                    acc += k * blurred.at(x, y + i as isize - 2);
                }
                out[oy * ow + ox] = acc;
            }
        }
        Self {
            width: ow,
            height: oh,
            data: out,
        }
    }

    /// Central-difference gradients `(d/dx, d/dy)`.
    pub(crate) fn gradients(&self) -> (Vec<f32>, Vec<f32>) {
        let w = self.width;
        let h = self.height;
        let mut gx = vec![0f32; w * h];
        let mut gy = vec![0f32; w * h];
        for y in 0..h {
            for x in 0..w {
                let (xi, yi) = (x as isize, y as isize);
                gx[y * w + x] = (self.at(xi + 1, yi) - self.at(xi - 1, yi)) * 0.5;
                gy[y * w + x] = (self.at(xi, yi + 1) - self.at(xi, yi - 1)) * 0.5;
            }
        }
        (gx, gy)
    }
}

/// Gradient plane with the same clamped bilinear sampling as [`GrayImage`].
#[derive(Clone, Debug)]
pub(crate) struct Level {
    pub(crate) image: GrayImage,
    pub(crate) gx: GrayImage,
    pub(crate) gy: GrayImage,
}

/// Image pyramid, finest level first, with per-level gradients.
#[derive(Clone, Debug)]
pub(crate) struct Pyramid {
    pub(crate) levels: Vec<Level>,
}

impl Pyramid {
    /// Base image plus up to `extra_levels` halvings (stops before a level gets smaller than 8 px).
    pub(crate) fn build(base: GrayImage, extra_levels: u32) -> Self {
        let mut images = vec![base];
        for _ in 0..extra_levels {
            let Some(last) = images.last() else { break };
            if last.width < 16 || last.height < 16 {
                break;
            }
            let next = last.pyr_down();
            images.push(next);
        }
        let levels = images
            .into_iter()
            .map(|image| {
                let (gx, gy) = image.gradients();
                let (w, h) = (image.width, image.height);
                Level {
                    gx: GrayImage {
                        width: w,
                        height: h,
                        data: gx,
                    },
                    gy: GrayImage {
                        width: w,
                        height: h,
                        data: gy,
                    },
                    image,
                }
            })
            .collect();
        Self { levels }
    }

    pub(crate) fn base(&self) -> &GrayImage {
        &self.levels[0].image
    }
}

#[cfg(test)]
#[path = "../../tests/unit/motion/image.rs"]
mod tests;
