use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Context as _;
use image::RgbaImage;
use image::imageops::FilterType;

use crate::effects::params::EffectParams;
use crate::effects::registry::EffectOp;
use crate::foundation::error::{FramelabError, FramelabResult};
use crate::foundation::frame::{Frame, PixelFormat};
use crate::foundation::math::{luma_u8, saturate_u8};
use crate::io::source::file_stamp;

const MAX_IMAGES: usize = 16;

/// Path, scale bits, and the file's length and modification time.
type ImageKey = (String, u64, Option<(u64, u64)>);

/// `overlay`: alpha-blend the image at `source` onto the frame at `(x, y)`.
///
/// The image is scaled by `scale` and blended with `opacity` times its own alpha. An overlay that
/// does not fit entirely inside the frame is skipped and the frame is returned unchanged.
///
/// Decoded (and scaled) images are cached per path, scale and file stamp, so each version of a
/// file is read once. At most `MAX_IMAGES` images are held.
pub(crate) struct Overlay {
    images: Mutex<HashMap<ImageKey, Arc<RgbaImage>>>,
}

impl Overlay {
    pub(crate) fn new() -> Self {
        Self {
            images: Mutex::new(HashMap::new()),
        }
    }

    fn image(&self, source: &str, scale: f64) -> FramelabResult<Arc<RgbaImage>> {
        let path = Path::new(source);
        let key = (source.to_owned(), scale.to_bits(), file_stamp(path));
        if let Some(img) = self.lock().get(&key) {
            return Ok(Arc::clone(img));
        }
        let img = Arc::new(load_scaled(path, scale)?);
        let mut images = self.lock();
        // Older versions of the same file are never served again.
        images.retain(|k, _| (k.0.as_str(), k.1) != (source, key.1));
        if images.len() >= MAX_IMAGES {
            images.clear();
        }
        images.insert(key, Arc::clone(&img));
        Ok(img)
    }

    #[cfg(test)]
    fn cached_images(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ImageKey, Arc<RgbaImage>>> {
        // A poisoned map only holds fully inserted images.
        self.images.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn load_scaled(path: &Path, scale: f64) -> FramelabResult<RgbaImage> {
    let img = image::open(path)
        .with_context(|| format!("overlay: failed to read image '{}'", path.display()))?
        .to_rgba8();
    if scale == 1.0 {
        return Ok(img);
    }
    let w = ((f64::from(img.width()) * scale).round() as u32).max(1);
    let h = ((f64::from(img.height()) * scale).round() as u32).max(1);
    Ok(image::imageops::resize(&img, w, h, FilterType::Triangle))
}

impl EffectOp for Overlay {
    fn apply(&self, frame: &Frame, params: &EffectParams<'_>) -> FramelabResult<Frame> {
        let source = params.text("source")?;
        let x = params.int_in("x", Some(10), i64::from(i32::MIN), i64::from(i32::MAX))?;
        let y = params.int_in("y", Some(10), i64::from(i32::MIN), i64::from(i32::MAX))?;
        let scale = params.number_in("scale", Some(1.0), 0.0, 10.0)?;
        if scale <= 0.0 {
            return Err(FramelabError::validation("overlay: param 'scale' must be > 0"));
        }
        let opacity = params.number_in("opacity", Some(1.0), 0.0, 1.0)?;

        let img = self.image(source, scale)?;
        let fits = x >= 0
            && y >= 0
            && x + i64::from(img.width()) <= i64::from(frame.width())
            && y + i64::from(img.height()) <= i64::from(frame.height());
        if !fits {
            tracing::debug!(
                frame = frame.index().0,
                source,
                "overlay does not fit inside the frame, skipped"
            );
            return Ok(frame.clone());
        }
        blend(frame, &img, x as u32, y as u32, opacity)
    }
}

fn blend(frame: &Frame, img: &RgbaImage, x0: u32, y0: u32, opacity: f64) -> FramelabResult<Frame> {
    let format = frame.format();
    let c = format.channels();
    let stride = frame.width() as usize * c;
    let mut out = frame.data().to_vec();
    for (ix, iy, px) in img.enumerate_pixels() {
        let a = opacity * f64::from(px[3]) / 255.0;
        if a == 0.0 {
            continue;
        }
        let off = (y0 + iy) as usize * stride + (x0 + ix) as usize * c;
        let dst = &mut out[off..off + c];
        let src: [u8; 3] = match format {
            PixelFormat::Gray8 => [luma_u8(px[0], px[1], px[2]); 3],
            PixelFormat::Rgb8 | PixelFormat::Rgba8 => [px[0], px[1], px[2]],
        };
        for (d, &s) in dst[..format.color_channels()].iter_mut().zip(&src) {
            *d = saturate_u8(f64::from(*d) * (1.0 - a) + f64::from(s) * a);
        }
    }
    frame.derive(frame.width(), frame.height(), out)
}

#[cfg(test)]
#[path = "../../tests/unit/effects/overlay.rs"]
mod tests;
