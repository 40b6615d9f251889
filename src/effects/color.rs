use crate::effects::params::EffectParams;
use crate::effects::registry::EffectOp;
use crate::foundation::error::FramelabResult;
use crate::foundation::frame::{Frame, PixelFormat};
use crate::foundation::math::saturate_u8;

/// `brightness`: adds `value` to every color channel.
pub(crate) struct Brightness;

/// `color_adjust`: `|contrast * x + brightness|`, saturated.
pub(crate) struct ColorAdjust;

/// `grayscale`: luma into every color channel.
pub(crate) struct Grayscale;

impl EffectOp for Brightness {
    fn apply(&self, frame: &Frame, params: &EffectParams<'_>) -> FramelabResult<Frame> {
        let value = params.number_in("value", None, -255.0, 255.0)?;
        let lut = build_lut(|x| saturate_u8(x + value));
        map_color_channels(frame, &lut)
    }
}

impl EffectOp for ColorAdjust {
    fn apply(&self, frame: &Frame, params: &EffectParams<'_>) -> FramelabResult<Frame> {
        let contrast = params.number_in("contrast", Some(1.0), 0.0, 3.0)?;
        let brightness = params.number_in("brightness", Some(0.0), -255.0, 255.0)?;
        let lut = build_lut(|x| saturate_u8((contrast * x + brightness).abs()));
        map_color_channels(frame, &lut)
    }
}

impl EffectOp for Grayscale {
    fn apply(&self, frame: &Frame, _params: &EffectParams<'_>) -> FramelabResult<Frame> {
        replicate_luma(frame, &frame.luma())
    }
}

fn build_lut(f: impl Fn(f64) -> u8) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (i, v) in lut.iter_mut().enumerate() {
        *v = f(i as f64);
    }
    lut
}

/// Apply a lookup table to the color channels, leaving alpha untouched.
fn map_color_channels(frame: &Frame, lut: &[u8; 256]) -> FramelabResult<Frame> {
    let format = frame.format();
    let c = format.channels();
    let cc = format.color_channels();
    let mut out = frame.data().to_vec();
    for px in out.chunks_exact_mut(c) {
        for v in &mut px[..cc] {
            *v = lut[*v as usize];
        }
    }
    frame.derive(frame.width(), frame.height(), out)
}

/// Write a single-channel plane into every color channel of a frame with `frame`'s layout.
pub(crate) fn replicate_luma(frame: &Frame, plane: &[u8]) -> FramelabResult<Frame> {
    let out = match frame.format() {
        PixelFormat::Gray8 => plane.to_vec(),
        PixelFormat::Rgb8 => plane.iter().flat_map(|&v| [v, v, v]).collect(),
        PixelFormat::Rgba8 => plane
            .iter()
            .zip(frame.data().chunks_exact(4))
            .flat_map(|(&v, px)| [v, v, v, px[3]])
            .collect(),
    };
    frame.derive(frame.width(), frame.height(), out)
}

#[cfg(test)]
#[path = "../../tests/unit/effects/color.rs"]
mod tests;
