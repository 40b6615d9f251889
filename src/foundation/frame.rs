use std::sync::Arc;

use crate::foundation::core::FrameIndex;
use crate::foundation::error::{FramelabError, FramelabResult};
use crate::foundation::math::luma_u8;

/// Pixel layout of a [`Frame`] buffer. All formats are 8 bits per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Single luma channel.
    Gray8,
    /// Interleaved red, green, blue.
    Rgb8,
    /// Interleaved red, green, blue, straight alpha.
    Rgba8,
}

impl PixelFormat {
    /// Number of interleaved channels per pixel.
    pub fn channels(self) -> usize {
        match self {
            Self::Gray8 => 1,
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }

    /// Number of leading color channels (alpha excluded).
    pub fn color_channels(self) -> usize {
        match self {
            Self::Gray8 => 1,
            Self::Rgb8 | Self::Rgba8 => 3,
        }
    }

    /// Whether the last channel is alpha.
    pub fn has_alpha(self) -> bool {
        matches!(self, Self::Rgba8)
    }

    /// Byte length of a tightly packed `width x height` buffer.
    pub fn buffer_len(self, width: u32, height: u32) -> usize {
        (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(self.channels())
    }
}

/// One decoded or processed video frame.
///
/// The pixel buffer is shared and immutable: processing stages always produce new frames, so a
/// frame published downstream can be handed to several readers without copying.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    index: FrameIndex,
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Arc<[u8]>,
}

impl Frame {
    /// Wrap a tightly packed, row-major pixel buffer.
    pub fn new(
        index: FrameIndex,
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> FramelabResult<Self> {
        if width == 0 || height == 0 {
            return Err(FramelabError::validation("frame width/height must be non-zero"));
        }
        let expected = format.buffer_len(width, height);
        if data.len() != expected {
            return Err(FramelabError::validation(format!(
                "frame buffer has {} bytes, expected {expected} for {width}x{height} {format:?}",
                data.len()
            )));
        }
        Ok(Self {
            index,
            width,
            height,
            format,
            data: data.into(),
        })
    }

    /// Frame filled with one repeated pixel value.
    pub fn filled(
        index: FrameIndex,
        width: u32,
        height: u32,
        format: PixelFormat,
        pixel: &[u8],
    ) -> FramelabResult<Self> {
        if pixel.len() != format.channels() {
            return Err(FramelabError::validation(
                "fill pixel must have one value per channel",
            ));
        }
        let count = (width as usize).saturating_mul(height as usize);
        Self::new(index, width, height, format, pixel.repeat(count))
    }

    /// Identity of the frame in its source timeline.
    pub fn index(&self) -> FrameIndex {
        self.index
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel layout.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Raw pixel bytes, row-major, tightly packed.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Size of the pixel buffer in bytes.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Channel values of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let c = self.format.channels();
        let off = (y as usize * self.width as usize + x as usize) * c;
        &self.data[off..off + c]
    }

    /// Build a new frame with the same identity and format from a replacement buffer.
    pub fn derive(&self, width: u32, height: u32, data: Vec<u8>) -> FramelabResult<Self> {
        Self::new(self.index, width, height, self.format, data)
    }

    /// Same pixels under another frame index. The buffer is shared, not copied.
    pub fn with_index(&self, index: FrameIndex) -> Self {
        Self {
            index,
            ..self.clone()
        }
    }

    /// Mean value over all color channels (alpha excluded).
    pub fn mean_intensity(&self) -> f64 {
        let c = self.format.channels();
        let cc = self.format.color_channels();
        let mut sum = 0u64;
        for px in self.data.chunks_exact(c) {
            for &v in &px[..cc] {
                sum += u64::from(v);
            }
        }
        let n = (self.data.len() / c * cc).max(1);
        sum as f64 / n as f64
    }

    /// Luma plane (BT.601 weights), one byte per pixel.
    pub fn luma(&self) -> Vec<u8> {
        match self.format {
            PixelFormat::Gray8 => self.data.to_vec(),
            PixelFormat::Rgb8 | PixelFormat::Rgba8 => self
                .data
                .chunks_exact(self.format.channels())
                .map(|px| luma_u8(px[0], px[1], px[2]))
                .collect(),
        }
    }

    /// Expand to straight-alpha RGBA8 (opaque when the source has no alpha).
    pub fn to_rgba8(&self) -> Vec<u8> {
        match self.format {
            PixelFormat::Rgba8 => self.data.to_vec(),
            PixelFormat::Rgb8 => self
                .data
                .chunks_exact(3)
                .flat_map(|px| [px[0], px[1], px[2], 255])
                .collect(),
            PixelFormat::Gray8 => self.data.iter().flat_map(|&v| [v, v, v, 255]).collect(),
        }
    }

    /// Box-filter downscale by `scale` in `(0, 1]`.
    ///
    /// Every output pixel averages the source pixels whose centers fall in its footprint.
    pub fn downscale(&self, scale: f64) -> FramelabResult<Self> {
        if !scale.is_finite() || scale <= 0.0 || scale > 1.0 {
            return Err(FramelabError::validation("downscale factor must be in (0, 1]"));
        }
        if scale == 1.0 {
            return Ok(self.clone());
        }
        let out_w = ((f64::from(self.width) * scale).round() as u32).max(1);
        let out_h = ((f64::from(self.height) * scale).round() as u32).max(1);
        let c = self.format.channels();
        let mut out = vec![0u8; self.format.buffer_len(out_w, out_h)];
        let sx = f64::from(self.width) / f64::from(out_w);
        let sy = f64::from(self.height) / f64::from(out_h);
        for oy in 0..out_h {
            let y0 = (f64::from(oy) * sy).floor() as u32;
            let y1 = ((f64::from(oy + 1) * sy).ceil() as u32).clamp(y0 + 1, self.height);
            for ox in 0..out_w {
                let x0 = (f64::from(ox) * sx).floor() as u32;
                let x1 = ((f64::from(ox + 1) * sx).ceil() as u32).clamp(x0 + 1, self.width);
                let mut acc = [0u32; 4];
                for y in y0..y1 {
                    for x in x0..x1 {
                        for (a, &v) in acc.iter_mut().zip(self.pixel(x, y)) {
                            *a += u32::from(v);
                        }
                    }
                }
                let n = (y1 - y0) * (x1 - x0);
                let off = (oy as usize * out_w as usize + ox as usize) * c;
                for ch in 0..c {
                    out[off + ch] = ((acc[ch] + n / 2) / n) as u8;
                }
            }
        }
        self.derive(out_w, out_h, out)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/frame.rs"]
mod tests;
