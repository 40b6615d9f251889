use std::sync::{Arc, Mutex, MutexGuard};

use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{FramelabError, FramelabResult};
use crate::foundation::frame::{Frame, PixelFormat};

/// Configuration handed to a [`FrameSink`] when a job starts writing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SinkConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frame rate.
    pub fps: Fps,
    /// Pixel layout of pushed frames.
    pub format: PixelFormat,
}

/// Encode service: open (`begin`), write (`push_frame`), close (`end`).
///
/// Ordering contract: `push_frame` is called in strictly increasing `FrameIndex` order. `end` is
/// called once after the last frame, also when a job is cancelled or fails after `begin`, so the
/// output written so far stays usable.
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> FramelabResult<()>;
    /// Push one frame.
    fn push_frame(&mut self, idx: FrameIndex, frame: &Frame) -> FramelabResult<()>;
    /// Finalize the output.
    fn end(&mut self) -> FramelabResult<()>;
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn begin(&mut self, cfg: SinkConfig) -> FramelabResult<()> {
        (**self).begin(cfg)
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &Frame) -> FramelabResult<()> {
        (**self).push_frame(idx, frame)
    }

    fn end(&mut self) -> FramelabResult<()> {
        (**self).end()
    }
}

#[derive(Debug, Default)]
struct Captured {
    cfg: Option<SinkConfig>,
    frames: Vec<Frame>,
    finished: bool,
}

/// In-memory sink for tests and debugging.
///
/// Clones share the captured frames, so a clone kept by the caller observes what a job wrote.
#[derive(Clone, Debug, Default)]
pub struct InMemorySink {
    inner: Arc<Mutex<Captured>>,
}

impl InMemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Captured> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<SinkConfig> {
        self.lock().cfg
    }

    /// Copy of the captured frames, in push order.
    pub fn frames(&self) -> Vec<Frame> {
        self.lock().frames.clone()
    }

    /// Indices of the captured frames, in push order.
    pub fn indices(&self) -> Vec<FrameIndex> {
        self.lock().frames.iter().map(Frame::index).collect()
    }

    /// `true` once `end` ran.
    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> FramelabResult<()> {
        let mut c = self.lock();
        c.cfg = Some(cfg);
        c.frames.clear();
        c.finished = false;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &Frame) -> FramelabResult<()> {
        let mut c = self.lock();
        if c.cfg.is_none() {
            return Err(FramelabError::encode("in-memory sink not started"));
        }
        if let Some(last) = c.frames.last()
            && idx <= last.index()
        {
            return Err(FramelabError::encode(format!(
                "in-memory sink received frame {idx} after {}",
                last.index()
            )));
        }
        c.frames.push(frame.with_index(idx));
        Ok(())
    }

    fn end(&mut self) -> FramelabResult<()> {
        self.lock().finished = true;
        Ok(())
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &std::path::Path) -> FramelabResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/io/sink.rs"]
mod tests;
