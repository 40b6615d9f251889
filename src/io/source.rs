use std::collections::BTreeSet;
use std::path::Path;

use crate::fingerprint::{Fingerprint, StableHasher};
use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{FramelabError, FramelabResult};
use crate::foundation::frame::{Frame, PixelFormat};

/// Stream properties reported by a [`FrameSource`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SourceInfo {
    /// Number of addressable frames.
    pub frame_count: u64,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Nominal frame rate.
    pub fps: Fps,
    /// Pixel layout of decoded frames.
    pub format: PixelFormat,
}

/// Failure to produce a frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The index lies past the last frame.
    #[error("end of stream at frame {0}")]
    EndOfStream(FrameIndex),
    /// The frame exists but could not be decoded.
    #[error("frame {frame}: {message}")]
    Corrupt {
        /// Frame that failed.
        frame: FrameIndex,
        /// Decoder message.
        message: String,
    },
}

impl DecodeError {
    /// Frame the error refers to.
    pub fn frame(&self) -> FrameIndex {
        match self {
            Self::EndOfStream(f) => *f,
            Self::Corrupt { frame, .. } => *frame,
        }
    }
}

impl From<DecodeError> for FramelabError {
    fn from(e: DecodeError) -> Self {
        FramelabError::decode(e.to_string())
    }
}

/// Random-access frame decoder.
///
/// Sequential reads are the common case; out-of-order reads must return the requested frame
/// without disturbing later sequential reads.
pub trait FrameSource: Send {
    /// Stream properties.
    fn info(&self) -> SourceInfo;
    /// Decode frame `idx`. The returned frame carries `idx` as its index.
    fn read(&mut self, idx: FrameIndex) -> Result<Frame, DecodeError>;
    /// Identity of the decoded content. Two sources share a fingerprint only when they decode to
    /// the same frames; it is part of every cache key.
    fn fingerprint(&self) -> Fingerprint;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn info(&self) -> SourceInfo {
        (**self).info()
    }

    fn read(&mut self, idx: FrameIndex) -> Result<Frame, DecodeError> {
        (**self).read(idx)
    }

    fn fingerprint(&self) -> Fingerprint {
        (**self).fingerprint()
    }
}

pub(crate) fn hash_info(h: &mut StableHasher, info: &SourceInfo) {
    h.write_u64(info.frame_count);
    h.write_u32(info.width);
    h.write_u32(info.height);
    h.write_u32(info.fps.num);
    h.write_u32(info.fps.den);
    h.write_u8(match info.format {
        PixelFormat::Gray8 => 0,
        PixelFormat::Rgb8 => 1,
        PixelFormat::Rgba8 => 2,
    });
}

/// Length and modification time (nanoseconds since the epoch) of a file, `None` when it cannot
/// be inspected.
pub(crate) fn file_stamp(path: &Path) -> Option<(u64, u64)> {
    let meta = std::fs::metadata(path).ok()?;
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_nanos() as u64);
    Some((meta.len(), mtime))
}

/// Path, length and modification time of a file; an edited file hashes differently.
pub(crate) fn hash_file(h: &mut StableHasher, path: &Path) {
    h.write_str(&path.to_string_lossy());
    match file_stamp(path) {
        Some((len, mtime)) => {
            h.write_u64(len);
            h.write_u64(mtime);
        }
        None => h.write_u64(u64::MAX),
    }
}

/// Source over frames held in memory, for tests and synthetic input.
#[derive(Clone, Debug)]
pub struct InMemorySource {
    info: SourceInfo,
    frames: Vec<Frame>,
    corrupt: BTreeSet<u64>,
    fingerprint: Fingerprint,
}

impl InMemorySource {
    /// Wrap `frames`; all must share size and pixel format.
    pub fn new(frames: Vec<Frame>, fps: Fps) -> FramelabResult<Self> {
        let first = frames
            .first()
            .ok_or_else(|| FramelabError::validation("in-memory source needs at least one frame"))?;
        let (width, height, format) = (first.width(), first.height(), first.format());
        if let Some(bad) = frames
            .iter()
            .position(|f| (f.width(), f.height(), f.format()) != (width, height, format))
        {
            return Err(FramelabError::validation(format!(
                "frame {bad} differs in size or format from frame 0"
            )));
        }
        let frames = frames
            .into_iter()
            .enumerate()
            .map(|(i, f)| f.with_index(FrameIndex(i as u64)))
            .collect::<Vec<_>>();
        let mut source = Self {
            info: SourceInfo {
                frame_count: frames.len() as u64,
                width,
                height,
                fps,
                format,
            },
            frames,
            corrupt: BTreeSet::new(),
            fingerprint: Fingerprint { hi: 0, lo: 0 },
        };
        source.fingerprint = source.content_fingerprint();
        Ok(source)
    }

    /// Hash of the pixel data and the injected failures; equal content means equal identity.
    fn content_fingerprint(&self) -> Fingerprint {
        let mut h = StableHasher::new();
        h.write_str("in_memory");
        hash_info(&mut h, &self.info);
        for f in &self.frames {
            h.write_bytes(f.data());
        }
        h.write_u64(self.corrupt.len() as u64);
        for &c in &self.corrupt {
            h.write_u64(c);
        }
        h.finish()
    }

    /// Build `count` frames from a generator.
    pub fn from_fn(
        count: u64,
        fps: Fps,
        mut generate: impl FnMut(FrameIndex) -> FramelabResult<Frame>,
    ) -> FramelabResult<Self> {
        let frames = (0..count)
            .map(|i| generate(FrameIndex(i)))
            .collect::<FramelabResult<Vec<_>>>()?;
        Self::new(frames, fps)
    }

    /// Make reads of `frames` fail with [`DecodeError::Corrupt`].
    pub fn with_corrupt(mut self, frames: impl IntoIterator<Item = u64>) -> Self {
        self.corrupt.extend(frames);
        self.fingerprint = self.content_fingerprint();
        self
    }

    /// Stored frames.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
}

impl FrameSource for InMemorySource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    fn read(&mut self, idx: FrameIndex) -> Result<Frame, DecodeError> {
        if self.corrupt.contains(&idx.0) {
            return Err(DecodeError::Corrupt {
                frame: idx,
                message: "injected decode failure".to_owned(),
            });
        }
        usize::try_from(idx.0)
            .ok()
            .and_then(|i| self.frames.get(i))
            .cloned()
            .ok_or(DecodeError::EndOfStream(idx))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/io/source.rs"]
mod tests;
