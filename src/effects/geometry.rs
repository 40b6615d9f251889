use crate::effects::params::EffectParams;
use crate::effects::registry::EffectOp;
use crate::foundation::error::{FramelabError, FramelabResult};
use crate::foundation::frame::Frame;

/// `crop`: keep the `width x height` rectangle at `(x, y)`, or with `aspect_w`/`aspect_h` the
/// largest centered rectangle of that aspect ratio.
pub(crate) struct Crop;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CropParams {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl CropParams {
    fn parse(params: &EffectParams<'_>, in_w: u32, in_h: u32) -> FramelabResult<Self> {
        if params.raw("aspect_w").is_some() || params.raw("aspect_h").is_some() {
            return Self::for_aspect(params, in_w, in_h);
        }
        let p = Self {
            x: params.u32("x", Some(0))?,
            y: params.u32("y", Some(0))?,
            width: params.u32("width", None)?,
            height: params.u32("height", None)?,
        };
        if p.width == 0 || p.height == 0 {
            return Err(FramelabError::validation(
                "crop: width and height must be non-zero",
            ));
        }
        let fits_x = u64::from(p.x) + u64::from(p.width) <= u64::from(in_w);
        let fits_y = u64::from(p.y) + u64::from(p.height) <= u64::from(in_h);
        if !fits_x || !fits_y {
            return Err(FramelabError::validation(format!(
                "crop: rectangle {}x{} at ({}, {}) exceeds {in_w}x{in_h} input",
                p.width, p.height, p.x, p.y
            )));
        }
        Ok(p)
    }

    fn for_aspect(params: &EffectParams<'_>, in_w: u32, in_h: u32) -> FramelabResult<Self> {
        if ["x", "y", "width", "height"]
            .iter()
            .any(|k| params.raw(k).is_some())
        {
            return Err(FramelabError::validation(
                "crop: aspect_w/aspect_h cannot be combined with x, y, width or height",
            ));
        }
        let aw = u64::from(params.u32("aspect_w", None)?);
        let ah = u64::from(params.u32("aspect_h", None)?);
        if aw == 0 || ah == 0 {
            return Err(FramelabError::validation("crop: aspect ratio terms must be non-zero"));
        }
        let (w, h) = (u64::from(in_w), u64::from(in_h));
        let (width, height) = if w * ah > h * aw {
            (h * aw / ah, h)
        } else {
            (w, w * ah / aw)
        };
        if width == 0 || height == 0 {
            return Err(FramelabError::validation(format!(
                "crop: {aw}:{ah} leaves no pixels of a {in_w}x{in_h} input"
            )));
        }
        // Both sides are bounded by the input size.
        let (width, height) = (width as u32, height as u32);
        Ok(Self {
            x: (in_w - width) / 2,
            y: (in_h - height) / 2,
            width,
            height,
        })
    }
}

impl EffectOp for Crop {
    fn output_size(
        &self,
        width: u32,
        height: u32,
        params: &EffectParams<'_>,
    ) -> FramelabResult<(u32, u32)> {
        let p = CropParams::parse(params, width, height)?;
        Ok((p.width, p.height))
    }

    fn output_origin(
        &self,
        width: u32,
        height: u32,
        params: &EffectParams<'_>,
    ) -> FramelabResult<(u32, u32)> {
        let p = CropParams::parse(params, width, height)?;
        Ok((p.x, p.y))
    }

    fn apply(&self, frame: &Frame, params: &EffectParams<'_>) -> FramelabResult<Frame> {
        let p = CropParams::parse(params, frame.width(), frame.height())?;
        crop_frame(frame, p.x, p.y, p.width, p.height)
    }
}

/// Copy out a sub-rectangle. The rectangle must lie inside the frame.
pub(crate) fn crop_frame(
    frame: &Frame,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> FramelabResult<Frame> {
    if u64::from(x) + u64::from(width) > u64::from(frame.width())
        || u64::from(y) + u64::from(height) > u64::from(frame.height())
    {
        return Err(FramelabError::validation("crop rectangle exceeds frame bounds"));
    }
    let c = frame.format().channels();
    let stride = frame.width() as usize * c;
    let row_len = width as usize * c;
    let mut out = Vec::with_capacity(row_len * height as usize);
    for row in y..y + height {
        let start = row as usize * stride + x as usize * c;
        out.extend_from_slice(&frame.data()[start..start + row_len]);
    }
    frame.derive(width, height, out)
}

#[cfg(test)]
#[path = "../../tests/unit/effects/geometry.rs"]
mod tests;
