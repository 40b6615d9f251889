use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::fingerprint::{Fingerprint, StableHasher};
use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{FramelabError, FramelabResult};
use crate::foundation::frame::{Frame, PixelFormat};
use crate::io::sink::{FrameSink, SinkConfig};
use crate::io::source::{DecodeError, FrameSource, SourceInfo, hash_file, hash_info};

/// File name of the `n`-th image of a sequence.
pub fn sequence_file_name(n: u64) -> String {
    format!("frame_{n:06}.png")
}

/// Frames read from the PNG files of a directory, in file-name order.
///
/// Size and pixel format come from the first image; later images must match.
#[derive(Clone, Debug)]
pub struct ImageSequenceSource {
    files: Vec<PathBuf>,
    info: SourceInfo,
    fingerprint: Fingerprint,
}

impl ImageSequenceSource {
    /// Scan `dir` for `*.png` files. Frame rate defaults to 30 fps.
    pub fn open(dir: impl AsRef<Path>) -> FramelabResult<Self> {
        let dir = dir.as_ref();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("failed to read image sequence directory '{}'", dir.display()))?
        {
            let path = entry
                .with_context(|| format!("failed to list '{}'", dir.display()))?
                .path();
            let is_png = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("png"));
            if is_png && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        let first = files.first().ok_or_else(|| {
            FramelabError::decode(format!("no PNG files in '{}'", dir.display()))
        })?;
        let img = image::open(first)
            .with_context(|| format!("failed to decode '{}'", first.display()))?;
        let format = if img.color().has_alpha() {
            PixelFormat::Rgba8
        } else if img.color().has_color() {
            PixelFormat::Rgb8
        } else {
            PixelFormat::Gray8
        };
        let info = SourceInfo {
            frame_count: files.len() as u64,
            width: img.width(),
            height: img.height(),
            fps: Fps::new(30, 1)?,
            format,
        };
        tracing::debug!(dir = %dir.display(), frames = info.frame_count, "opened image sequence");
        let fingerprint = Self::identity(&files, &info);
        Ok(Self {
            files,
            info,
            fingerprint,
        })
    }

    fn identity(files: &[PathBuf], info: &SourceInfo) -> Fingerprint {
        let mut h = StableHasher::new();
        h.write_str("image_sequence");
        hash_info(&mut h, info);
        for f in files {
            hash_file(&mut h, f);
        }
        h.finish()
    }

    /// Override the nominal frame rate.
    pub fn with_fps(mut self, fps: Fps) -> Self {
        self.info.fps = fps;
        self.fingerprint = Self::identity(&self.files, &self.info);
        self
    }
}

impl FrameSource for ImageSequenceSource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    fn read(&mut self, idx: FrameIndex) -> Result<Frame, DecodeError> {
        let path = usize::try_from(idx.0)
            .ok()
            .and_then(|i| self.files.get(i))
            .ok_or(DecodeError::EndOfStream(idx))?;
        let corrupt = |message: String| DecodeError::Corrupt {
            frame: idx,
            message,
        };
        let img = image::open(path)
            .map_err(|e| corrupt(format!("failed to decode '{}': {e}", path.display())))?;
        if (img.width(), img.height()) != (self.info.width, self.info.height) {
            return Err(corrupt(format!(
                "'{}' is {}x{}, sequence is {}x{}",
                path.display(),
                img.width(),
                img.height(),
                self.info.width,
                self.info.height
            )));
        }
        let data = match self.info.format {
            PixelFormat::Gray8 => img.into_luma8().into_raw(),
            PixelFormat::Rgb8 => img.into_rgb8().into_raw(),
            PixelFormat::Rgba8 => img.into_rgba8().into_raw(),
        };
        Frame::new(idx, self.info.width, self.info.height, self.info.format, data)
            .map_err(|e| corrupt(e.to_string()))
    }
}

/// Writes each frame as `frame_000000.png`, `frame_000001.png`, ... into a directory.
#[derive(Debug)]
pub struct ImageSequenceSink {
    dir: PathBuf,
    cfg: Option<SinkConfig>,
    written: u64,
    last_idx: Option<FrameIndex>,
}

impl ImageSequenceSink {
    /// Sink writing into `dir` (created on `begin`).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cfg: None,
            written: 0,
            last_idx: None,
        }
    }

    /// Number of images written so far.
    pub fn written(&self) -> u64 {
        self.written
    }
}

pub(crate) fn color_type(format: PixelFormat) -> image::ColorType {
    match format {
        PixelFormat::Gray8 => image::ColorType::L8,
        PixelFormat::Rgb8 => image::ColorType::Rgb8,
        PixelFormat::Rgba8 => image::ColorType::Rgba8,
    }
}

/// Write `frame` as a PNG at `path`.
pub(crate) fn save_png(frame: &Frame, path: &Path) -> FramelabResult<()> {
    image::save_buffer_with_format(
        path,
        frame.data(),
        frame.width(),
        frame.height(),
        color_type(frame.format()),
        image::ImageFormat::Png,
    )
    .with_context(|| format!("failed to write '{}'", path.display()))?;
    Ok(())
}

impl FrameSink for ImageSequenceSink {
    fn begin(&mut self, cfg: SinkConfig) -> FramelabResult<()> {
        std::fs::create_dir_all(&self.dir).with_context(|| {
            format!("failed to create output directory '{}'", self.dir.display())
        })?;
        self.cfg = Some(cfg);
        self.written = 0;
        self.last_idx = None;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &Frame) -> FramelabResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| FramelabError::encode("image sequence sink not started"))?;
        if let Some(last) = self.last_idx
            && idx <= last
        {
            return Err(FramelabError::encode(
                "image sequence sink received out-of-order frame index",
            ));
        }
        if (frame.width(), frame.height()) != (cfg.width, cfg.height) {
            return Err(FramelabError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width(),
                frame.height(),
                cfg.width,
                cfg.height
            )));
        }
        save_png(frame, &self.dir.join(sequence_file_name(self.written)))?;
        self.last_idx = Some(idx);
        self.written += 1;
        Ok(())
    }

    fn end(&mut self) -> FramelabResult<()> {
        tracing::debug!(dir = %self.dir.display(), written = self.written, "image sequence closed");
        self.cfg = None;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/io/sequence.rs"]
mod tests;
